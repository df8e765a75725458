pub mod delete;
pub mod import;
pub mod init;
pub mod progress;
pub mod quiz;
pub mod reconcile;
pub mod review;
pub mod session;
pub mod show;
pub mod validate;

use std::path::Path;

use anyhow::Result;

use spacedrep_core::Scheduler;
use spacedrep_store::config::{create_store, load_config_from, SpacedrepConfig, StoreConfig};

/// Load the config and build a scheduler on the configured store.
pub(crate) fn open_scheduler(config_path: Option<&Path>) -> Result<(SpacedrepConfig, Scheduler)> {
    let config = load_config_from(config_path)?;
    if config.store == StoreConfig::Memory {
        tracing::warn!("memory store configured; nothing will persist after this command");
    }
    let store = create_store(&config.store)?;
    let scheduler = Scheduler::with_system_clock(store, config.scheduler_config())?;
    Ok((config, scheduler))
}
