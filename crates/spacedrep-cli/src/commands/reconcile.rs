//! The `spacedrep reconcile` command.

use std::path::PathBuf;

use anyhow::Result;

use spacedrep_core::model::{SubjectId, UserId};

pub async fn execute(user: UserId, subject: SubjectId, config_path: Option<PathBuf>) -> Result<()> {
    let (_, scheduler) = super::open_scheduler(config_path.as_deref())?;

    let report = scheduler.reconcile(&user, &subject).await?;
    if report.drifted() {
        println!(
            "Repaired {}: {} of {} card counter(s){}",
            report.subject_id,
            report.cards_repaired,
            report.cards_checked,
            if report.subject_repaired {
                " and the subject rollup"
            } else {
                ""
            }
        );
    } else {
        println!(
            "{}: {} card counter(s) consistent.",
            report.subject_id, report.cards_checked
        );
    }
    println!(
        "  {} attempt(s), {} correct ({:.1}%)",
        report.subject_progress.attempts_count,
        report.subject_progress.correct_count,
        report.subject_progress.accuracy() * 100.0
    );

    Ok(())
}
