//! spacedrep-store — Card store backends.
//!
//! Implements the `CardStore` trait with an in-memory store and a JSON
//! snapshot file store, and loads the spacedrep configuration that picks
//! between them.

pub mod backend;
pub mod config;
pub mod error;
pub mod json;
pub mod memory;
pub mod snapshot;

pub use config::{create_store, load_config, load_config_from, SpacedrepConfig, StoreConfig};
pub use error::StoreError;
pub use json::JsonFileStore;
pub use memory::InMemoryCardStore;
pub use snapshot::Snapshot;
