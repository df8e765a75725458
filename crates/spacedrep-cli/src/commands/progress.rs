//! The `spacedrep progress` command.

use std::path::PathBuf;

use anyhow::Result;

use spacedrep_core::model::{SubjectId, UserId};
use spacedrep_core::progress::{truncate, ProgressReport};

pub async fn execute(
    user: UserId,
    subject: Option<SubjectId>,
    format: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, scheduler) = super::open_scheduler(config_path.as_deref())?;

    let report = scheduler.get_progress(&user, subject.as_ref()).await?;

    match format.as_str() {
        "markdown" | "md" => {
            println!("{}", report.to_markdown());
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => print_text(&report),
    }

    Ok(())
}

fn print_text(report: &ProgressReport) {
    use comfy_table::{Cell, Table};

    if report.subjects.is_empty() {
        println!("No progress recorded for {}.", report.user_id);
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["Subject", "Cards", "Attempts", "Correct", "Accuracy"]);
    for s in &report.subjects {
        table.add_row(vec![
            Cell::new(&s.subject_id),
            Cell::new(s.cards.len()),
            Cell::new(s.progress.attempts_count),
            Cell::new(s.progress.correct_count),
            Cell::new(format!("{:.1}%", s.progress.accuracy * 100.0)),
        ]);
    }
    println!("{table}");
    println!(
        "Overall: {} attempt(s), {:.1}% accuracy",
        report.overall.attempts_count,
        report.overall.accuracy * 100.0
    );

    // Weakest cards first.
    let mut cards: Vec<_> = report
        .subjects
        .iter()
        .flat_map(|s| s.cards.iter().map(move |c| (&s.subject_id, c)))
        .filter(|(_, c)| c.progress.attempts_count > 0)
        .collect();
    if cards.is_empty() {
        return;
    }
    cards.sort_by(|a, b| a.1.progress.accuracy.total_cmp(&b.1.progress.accuracy));

    let mut table = Table::new();
    table.set_header(vec!["Subject", "Question", "Phase", "Attempts", "Accuracy"]);
    for (subject, c) in cards {
        table.add_row(vec![
            Cell::new(subject),
            Cell::new(truncate(&c.question, 50)),
            Cell::new(c.phase),
            Cell::new(c.progress.attempts_count),
            Cell::new(format!("{:.1}%", c.progress.accuracy * 100.0)),
        ]);
    }
    println!("{table}");
}
