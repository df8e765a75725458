//! The `spacedrep session` command.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use spacedrep_core::model::{CardId, CardKind, Phase, ScheduledCard, SubjectId, UserId};
use spacedrep_core::progress::truncate;
use spacedrep_core::queue::SessionRequest;

#[derive(Serialize)]
struct SessionEntry {
    card_id: CardId,
    subject: SubjectId,
    kind: CardKind,
    phase: Phase,
    question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Vec<String>>,
}

impl From<ScheduledCard> for SessionEntry {
    fn from(c: ScheduledCard) -> Self {
        Self {
            card_id: c.card.id,
            subject: c.card.subject_id,
            kind: c.card.kind,
            phase: c.state.phase,
            question: c.card.question,
            options: c.card.options,
        }
    }
}

pub async fn execute(
    user: UserId,
    subject: Option<SubjectId>,
    max_size: Option<usize>,
    new_ratio: Option<f64>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (config, scheduler) = super::open_scheduler(config_path.as_deref())?;

    let request = SessionRequest {
        user_id: user.clone(),
        subject,
        max_size: max_size.unwrap_or(config.session.max_size),
        new_card_ratio: new_ratio.unwrap_or(config.session.new_card_ratio),
    };
    let ids = scheduler.get_session(&request).await?;

    let mut entries = Vec::with_capacity(ids.len());
    for id in ids {
        entries.push(SessionEntry::from(scheduler.get_card(&user, id).await?));
    }

    match format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => print_table(&entries),
    }

    Ok(())
}

fn print_table(entries: &[SessionEntry]) {
    use comfy_table::Table;

    if entries.is_empty() {
        println!("Nothing to review.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Card", "Subject", "Kind", "Phase", "Question"]);
    for (i, e) in entries.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            e.card_id.to_string(),
            e.subject.to_string(),
            e.kind.to_string(),
            e.phase.to_string(),
            truncate(&e.question, 60),
        ]);
    }
    println!("{table}");
    println!("{} card(s) in session.", entries.len());
}
