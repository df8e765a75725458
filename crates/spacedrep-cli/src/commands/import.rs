//! The `spacedrep import` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use spacedrep_core::model::UserId;
use spacedrep_core::parser;
use spacedrep_core::SchedulerError;

pub async fn execute(user: UserId, deck_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let decks = parser::load_decks(&deck_path)?;
    anyhow::ensure!(!decks.is_empty(), "no decks found in {}", deck_path.display());

    let (_, scheduler) = super::open_scheduler(config_path.as_deref())?;

    let mut imported = 0;
    for deck in decks {
        for w in parser::validate_deck(&deck) {
            let at = w.card_index.map(|i| format!(" card {i}")).unwrap_or_default();
            eprintln!("  WARNING ({}{at}): {}", deck.name, w.message);
        }

        let mut count = 0;
        for (i, card) in deck.cards.into_iter().enumerate() {
            match scheduler.add_card(&user, card).await {
                Ok(_) => count += 1,
                Err(SchedulerError::InvalidRequest(reason)) => {
                    eprintln!("  SKIPPED ({} card {}): {reason}", deck.name, i + 1);
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("failed to import deck '{}'", deck.name));
                }
            }
        }
        println!("Imported {count} card(s) into {} from {}", deck.subject, deck.name);
        imported += count;
    }

    tracing::info!(user = %user, cards = imported, "import finished");
    println!("{imported} card(s) imported for {user}.");
    Ok(())
}
