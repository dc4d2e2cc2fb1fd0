//! Storage traits and error types
//!
//! This module defines the trait interface for persistence backends and
//! associated error types.

use crate::storage::{Checkpoint, FoundRecord};
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for persistence backends
///
/// The checkpoint is the only progress state; the found list is append-only
/// and never rewritten except to add records.
pub trait Storage: Send {
    /// Loads the last checkpoint
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - Nothing was saved yet
    /// * `Err(StorageError::Corrupt)` - A checkpoint exists but cannot be read
    fn load_checkpoint(&self) -> StorageResult<Option<Checkpoint>>;

    /// Replaces the checkpoint atomically
    fn save_checkpoint(&mut self, checkpoint: &Checkpoint) -> StorageResult<()>;

    /// Loads every recorded find, oldest first
    fn load_found(&self) -> StorageResult<Vec<FoundRecord>>;

    /// Appends finds, skipping domains already recorded
    ///
    /// # Returns
    ///
    /// Number of records actually appended
    fn append_found(&mut self, records: &[FoundRecord]) -> StorageResult<usize>;
}
