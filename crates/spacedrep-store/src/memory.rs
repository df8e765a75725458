//! In-memory card store.

use std::sync::{PoisonError, RwLock};

use spacedrep_core::Result;

use crate::backend::{Backend, SnapshotStore};
use crate::error::StoreError;
use crate::snapshot::Snapshot;

/// Keeps nothing beyond the process lifetime.
///
/// Writes mutate the snapshot in place under the lock; the snapshot's own
/// methods leave it unchanged when they fail.
#[derive(Debug, Default)]
pub struct Memory {
    state: RwLock<Snapshot>,
}

impl Backend for Memory {
    fn name(&self) -> &str {
        "memory"
    }

    fn read<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> Result<T, StoreError> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&guard))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T> {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

/// A card store that lives only in process memory.
pub type InMemoryCardStore = SnapshotStore<Memory>;

impl InMemoryCardStore {
    pub fn new() -> Self {
        Self::with_backend(Memory::default())
    }
}

impl Default for InMemoryCardStore {
    fn default() -> Self {
        Self::new()
    }
}
