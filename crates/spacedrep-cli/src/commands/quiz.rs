//! The `spacedrep quiz` command.

use std::path::PathBuf;

use anyhow::Result;

use spacedrep_core::grading::{AnswerMatch, Grade};
use spacedrep_core::model::{CardId, UserId};

pub async fn execute(
    user: UserId,
    card: CardId,
    answer: String,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (_, scheduler) = super::open_scheduler(config_path.as_deref())?;

    let outcome = scheduler
        .answer_quiz(&user, card, &answer, &AnswerMatch)
        .await?;

    match outcome.grade {
        Grade::Correct => println!("Correct!"),
        Grade::Partial => println!("Almost. Expected: {}", outcome.expected_answer),
        Grade::Incorrect => println!("Incorrect. Expected: {}", outcome.expected_answer),
    }
    println!(
        "  Recorded quality {}; card accuracy {:.1}% over {} attempt(s)",
        outcome.quality,
        outcome.card_progress.accuracy() * 100.0,
        outcome.card_progress.attempts_count
    );

    Ok(())
}
