//! JSON snapshot file store.
//!
//! The whole snapshot is rewritten on every mutation: serialized into a
//! temporary file next to the target, flushed, then renamed over it. A crash
//! leaves either the previous or the new snapshot on disk, never a mix.
//!
//! Writers take an exclusive lock on a `<file>.lock` sidecar and reload the
//! file under it, so several processes (or several handles in one process)
//! can share a store without losing each other's writes. Readers need no
//! lock: the rename publishes each snapshot whole.

use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use spacedrep_core::Result;

use crate::backend::{Backend, SnapshotStore};
use crate::error::StoreError;
use crate::snapshot::Snapshot;

/// Persists the snapshot to one JSON file.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }

    fn io(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Read the snapshot, or an empty one if the file does not exist yet.
    fn load(&self) -> Result<Snapshot, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Snapshot::default()),
            Err(e) => return Err(self.io(e)),
        };
        if content.trim().is_empty() {
            return Ok(Snapshot::default());
        }
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let tmp = tempfile::NamedTempFile::new_in(self.dir()).map_err(|e| self.io(e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            serde_json::to_writer_pretty(&mut writer, snapshot).map_err(|source| {
                StoreError::Encode {
                    path: self.path.clone(),
                    source,
                }
            })?;
            writer.flush().map_err(|e| self.io(e))?;
        }
        tmp.as_file().sync_all().map_err(|e| self.io(e))?;
        tmp.persist(&self.path).map_err(|e| self.io(e.error))?;

        tracing::trace!(
            path = %self.path.display(),
            cards = snapshot.cards.len(),
            attempts = snapshot.attempts.len(),
            "snapshot persisted"
        );
        Ok(())
    }
}

impl Backend for JsonFile {
    fn name(&self) -> &str {
        "json"
    }

    fn read<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> Result<T, StoreError> {
        self.load().map(|snapshot| f(&snapshot))
    }

    fn write<T>(&self, f: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T> {
        std::fs::create_dir_all(self.dir()).map_err(|e| self.io(e))?;

        let lock_path = self.lock_path();
        let lock_err = |source: std::io::Error| StoreError::Io {
            path: lock_path.clone(),
            source,
        };
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(lock_err)?;
        let mut lock = fd_lock::RwLock::new(lock_file);
        let _guard = lock.write().map_err(lock_err)?;

        let mut snapshot = self.load()?;
        let out = f(&mut snapshot)?;
        self.persist(&snapshot)?;
        Ok(out)
    }
}

/// A card store persisted as a JSON snapshot file.
pub type JsonFileStore = SnapshotStore<JsonFile>;

impl JsonFileStore {
    /// Open the store at `path`, creating it on first write. An existing file
    /// must hold a valid snapshot.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let backend = JsonFile { path: path.into() };
        let snapshot = backend.load()?;
        tracing::debug!(
            path = %backend.path.display(),
            cards = snapshot.cards.len(),
            "opened JSON store"
        );
        Ok(Self::with_backend(backend))
    }

    pub fn path(&self) -> &Path {
        self.backend().path()
    }
}
