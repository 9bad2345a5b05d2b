//! Error types for the consolidation store.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, updating or persisting a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem read/write failure.
    #[error("I/O error on {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted file is not a valid consolidated document.
    #[error("Corrupt store file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// An incoming job record has no identifier.
    #[error("Job record at index {index} has no identifier")]
    MissingJobId { index: usize },

    /// Failed to encode the document.
    #[error("Failed to serialize store: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Another writer holds the lock file.
    #[error("Store is locked by another writer (remove {path} if no other process is running)")]
    Locked { path: PathBuf },

    /// Refused to merge a store file into itself.
    #[error("Cannot merge {path} into itself")]
    SelfMerge { path: PathBuf },

    /// The job provider failed.
    #[error("Job provider failed: {0}")]
    Provider(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}
