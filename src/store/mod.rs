//! Durable catalog store for downloadable media items.
//!
//! The queue manager never owns item state; it drives transitions through
//! the [`ItemStore`] interface and every transition is committed to durable
//! storage before the manager moves on. [`SqliteStore`] is the production
//! implementation, backed by the crate [`Database`](crate::db::Database).
//!
//! # Overview
//!
//! - [`MediaItem`] - One catalog entry with its download lifecycle state
//! - [`DownloadStatus`] - Tagged lifecycle states
//! - [`ItemStore`] - Interface consumed by the queue manager
//! - [`SqliteStore`] - SQLite-backed implementation
//! - [`StoreError`] - Operation error types

mod error;
mod item;
mod sqlite;

pub use error::StoreError;
pub use item::{DownloadStatus, MediaItem};
pub use sqlite::SqliteStore;

use std::path::Path;

use async_trait::async_trait;

/// Durable store of media items consumed by the queue manager.
///
/// Implementations must commit each `mark_*` call before returning; the
/// manager relies on "persist immediately after every transition" and never
/// batches writes across items.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Registers a remote source, returning the existing item when the URL
    /// is already known.
    async fn add(&self, remote_source: &str) -> Result<MediaItem, StoreError>;

    /// Fetches an item by id.
    async fn get(&self, id: i64) -> Result<Option<MediaItem>, StoreError>;

    /// Lists all items in insertion order.
    async fn list(&self) -> Result<Vec<MediaItem>, StoreError>;

    /// Transitions an item to `Waiting`.
    ///
    /// Only valid from `NotStarted` or `Failed`; clears any previous error
    /// and resets progress to zero.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ItemNotFound`] for an unknown id and
    /// [`StoreError::InvalidTransition`] when the item is in any other state.
    async fn mark_waiting(&self, id: i64) -> Result<(), StoreError>;

    /// Transitions an item to `Downloading`.
    ///
    /// Only valid from `Waiting`; the guard keeps a stale backlog entry
    /// from ever producing a second active transfer.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ItemNotFound`] for an unknown id and
    /// [`StoreError::InvalidTransition`] when the item is not `Waiting`.
    async fn mark_downloading(&self, id: i64) -> Result<(), StoreError>;

    /// Transitions an item to `Downloaded` with its finalized path and
    /// progress pinned to 100.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ItemNotFound`] for an unknown id and
    /// [`StoreError::InvalidTransition`] when the item is not `Downloading`.
    async fn mark_downloaded(&self, id: i64, local_path: &Path) -> Result<(), StoreError>;

    /// Transitions an item to `Failed`, recording the terminal reason and
    /// clearing any stored path and progress.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ItemNotFound`] for an unknown id.
    async fn mark_failed(&self, id: i64, reason: &str) -> Result<(), StoreError>;

    /// Records download progress for the active item.
    ///
    /// Best-effort by design: a no-op unless the item is currently
    /// `Downloading`, so a late tick can never clobber a finalized row.
    async fn set_percent(&self, id: i64, percent: f64) -> Result<(), StoreError>;

    /// Clears all download state back to `NotStarted`.
    ///
    /// Deleting the backing file is the caller's responsibility and must
    /// happen before the state is cleared.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ItemNotFound`] for an unknown id.
    async fn reset(&self, id: i64) -> Result<(), StoreError>;

    /// Resets items left `Waiting` or `Downloading` by a previous run.
    ///
    /// Partial downloads are not resumable, so interrupted items go back to
    /// `NotStarted` and must be requested again. Returns the number of
    /// items reset. Called once at startup, before any enqueue.
    async fn recover_interrupted(&self) -> Result<u64, StoreError>;
}
