//! Error types for the queue manager.

use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;
use crate::transfer::TransferError;

/// Umbrella error for a single item's download attempt.
///
/// The manager never returns these to `enqueue` callers; they become the
/// item's persisted failure reason and are broadcast on the event channel.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Persisting a lifecycle transition failed.
    #[error("persistence failed: {0}")]
    Store(#[from] StoreError),

    /// The transfer backend reported a terminal failure.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// Moving the finished file into stable storage failed.
    #[error("finalize failed at {path}: {source}")]
    Finalize {
        /// The path involved in the failed filesystem operation.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl DownloadError {
    /// Creates a finalization error.
    pub fn finalize(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Finalize {
            path: path.into(),
            source,
        }
    }
}
