//! The `spacedrep show` command.

use std::path::PathBuf;

use anyhow::Result;

use spacedrep_core::model::{CardId, UserId};

pub async fn execute(user: UserId, card: CardId, config_path: Option<PathBuf>) -> Result<()> {
    use comfy_table::Table;

    let (_, scheduler) = super::open_scheduler(config_path.as_deref())?;

    let scheduled = scheduler.get_card(&user, card).await?;
    let preview = scheduler.preview(&user, card).await?;
    let (card, state) = (&scheduled.card, &scheduled.state);

    println!("Card {} [{}] ({})", card.id, card.subject_id, card.kind);
    println!("  Q: {}", card.question);
    if let Some(options) = &card.options {
        for (i, option) in options.iter().enumerate() {
            println!("     {}. {option}", i + 1);
        }
    }
    println!("  A: {}", card.answer);
    if let Some(source) = &card.source {
        match source.page {
            Some(page) => println!("  Source: {}, page {page}", source.document),
            None => println!("  Source: {}", source.document),
        }
    }
    println!(
        "  Phase {}, due {}, ease {:.2}, interval {} day(s), lapses {}",
        state.phase,
        state.due_at.format("%Y-%m-%d %H:%M UTC"),
        state.ease_factor,
        state.interval_days,
        state.lapse_count
    );

    let mut table = Table::new();
    table.set_header(vec!["Quality", "Interval", "Due"]);
    for p in &preview {
        table.add_row(vec![
            p.quality.to_string(),
            format!("{}d", p.interval_days),
            p.due_at.format("%Y-%m-%d").to_string(),
        ]);
    }
    println!("{table}");

    Ok(())
}
