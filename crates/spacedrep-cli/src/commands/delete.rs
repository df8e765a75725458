//! The `spacedrep delete` command.

use std::path::PathBuf;

use anyhow::Result;

use spacedrep_core::model::{CardId, UserId};

pub async fn execute(user: UserId, card: CardId, config_path: Option<PathBuf>) -> Result<()> {
    let (_, scheduler) = super::open_scheduler(config_path.as_deref())?;
    scheduler.delete_card(&user, card).await?;
    println!("Deleted card {card}.");
    Ok(())
}
