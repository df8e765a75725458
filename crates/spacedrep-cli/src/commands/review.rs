//! The `spacedrep review` command.

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};

use spacedrep_core::model::{CardId, UserId};

pub async fn execute(
    user: UserId,
    card: CardId,
    quality: i64,
    at: Option<DateTime<Utc>>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, scheduler) = super::open_scheduler(config_path.as_deref())?;

    let receipt = scheduler.submit_review(&user, card, quality, at).await?;
    let state = &receipt.state;

    println!(
        "Card {}: {} -> {}",
        receipt.card_id, receipt.transition.from, receipt.transition.to
    );
    println!(
        "  Next review: {} (in {} day(s))",
        state.due_at.format("%Y-%m-%d %H:%M UTC"),
        state.interval_days
    );
    println!(
        "  Ease {:.2}, repetitions {}, lapses {}",
        state.ease_factor, state.repetition_count, state.lapse_count
    );
    println!(
        "  Card accuracy {:.1}% over {} attempt(s); subject accuracy {:.1}% over {}",
        receipt.card_progress.accuracy() * 100.0,
        receipt.card_progress.attempts_count,
        receipt.subject_progress.accuracy() * 100.0,
        receipt.subject_progress.attempts_count
    );

    Ok(())
}
