//! # Workspace
//!
//! A store plus the configured workshop sequence: what the CLI and the
//! HTTP server hold for the lifetime of a process.
//!
//! ## Storage Backends
//!
//! - `InMemory`: a [`MemoryStore`], optionally loaded from and saved to a
//!   snapshot file
//! - `Persistent`: a [`RedbStore`]; every commit is durable

use crate::access::WorkshopAccessManager;
use crate::formats::{snapshot_from_bytes, snapshot_to_bytes};
use crate::repository::Store;
use crate::sequence::WorkshopSequence;
use crate::storage::{MemoryStore, RedbStore};
use crate::{AssessmentId, ManaError};
use std::path::Path;
use tracing::{debug, info};

/// Storage behind a [`Workspace`].
#[derive(Debug)]
pub enum StorageBackend {
    /// BTreeMap store (fast, volatile unless saved).
    InMemory(MemoryStore),
    /// redb database (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

/// Store and sequence for one deployment.
#[derive(Debug, Default)]
pub struct Workspace {
    backend: StorageBackend,
    sequence: WorkshopSequence,
}

impl Workspace {
    /// Empty in-memory workspace.
    #[must_use]
    pub fn in_memory(sequence: WorkshopSequence) -> Self {
        Self::with_store(MemoryStore::new(), sequence)
    }

    #[must_use]
    pub fn with_store(store: MemoryStore, sequence: WorkshopSequence) -> Self {
        Self {
            backend: StorageBackend::InMemory(store),
            sequence,
        }
    }

    /// Open (or create) a redb database at `path`.
    pub fn with_redb(
        path: impl AsRef<Path>,
        sequence: WorkshopSequence,
    ) -> Result<Self, ManaError> {
        let store = RedbStore::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "opened redb workspace");
        Ok(Self {
            backend: StorageBackend::Persistent(store),
            sequence,
        })
    }

    /// Load an in-memory workspace from a snapshot file.
    ///
    /// A missing file yields an empty workspace.
    pub fn from_snapshot_file(
        path: impl AsRef<Path>,
        sequence: WorkshopSequence,
    ) -> Result<Self, ManaError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "no snapshot yet, starting empty");
            return Ok(Self::in_memory(sequence));
        }

        let bytes = std::fs::read(path).map_err(|e| ManaError::Io(e.to_string()))?;
        let store = MemoryStore::from_snapshot(snapshot_from_bytes(&bytes)?)?;
        info!(path = %path.display(), bytes = bytes.len(), "loaded snapshot");
        Ok(Self::with_store(store, sequence))
    }

    /// Write the in-memory store to `path`, replacing it atomically.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a redb workspace, which persists on every commit.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), ManaError> {
        let StorageBackend::InMemory(store) = &self.backend else {
            return Err(ManaError::InvalidInput(
                "redb workspaces are saved on every commit".to_string(),
            ));
        };

        let path = path.as_ref();
        let bytes = snapshot_to_bytes(&store.snapshot())?;
        let staging = path.with_extension("tmp");
        std::fs::write(&staging, &bytes).map_err(|e| ManaError::Io(e.to_string()))?;
        std::fs::rename(&staging, path).map_err(|e| ManaError::Io(e.to_string()))?;
        debug!(path = %path.display(), bytes = bytes.len(), "saved snapshot");
        Ok(())
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    #[must_use]
    pub fn sequence(&self) -> &WorkshopSequence {
        &self.sequence
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        match &self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    pub fn store_mut(&mut self) -> &mut dyn Store {
        match &mut self.backend {
            StorageBackend::InMemory(store) => store,
            StorageBackend::Persistent(store) => store,
        }
    }

    /// Access manager for one assessment under this workspace's sequence.
    #[must_use]
    pub fn access(&self, assessment: AssessmentId) -> WorkshopAccessManager {
        WorkshopAccessManager::new(assessment, self.sequence.clone())
    }
}
