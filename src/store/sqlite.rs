//! SQLite-backed implementation of the item store.

use std::path::Path;

use async_trait::async_trait;
use tracing::instrument;

use super::{ItemStore, MediaItem, StoreError};
use crate::db::Database;

/// SQLite-backed media item store.
///
/// All transition methods are single guarded UPDATE statements, so each
/// state change is atomic and committed before the call returns.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Creates a new store over the given database connection.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Resolves a zero-rows-affected update into a precise error by
    /// re-reading the row: missing id vs. wrong current state.
    async fn transition_rejected(&self, id: i64, to: &str) -> StoreError {
        match self.get(id).await {
            Ok(Some(item)) => StoreError::invalid_transition(id, item.status_str, to),
            Ok(None) => StoreError::ItemNotFound(id),
            Err(err) => err,
        }
    }
}

#[async_trait]
impl ItemStore for SqliteStore {
    #[instrument(skip(self), fields(remote_source = %remote_source))]
    async fn add(&self, remote_source: &str) -> Result<MediaItem, StoreError> {
        sqlx::query(
            r"INSERT INTO media_items (remote_source)
              VALUES (?)
              ON CONFLICT(remote_source) DO NOTHING",
        )
        .bind(remote_source)
        .execute(self.db.pool())
        .await?;

        let item = sqlx::query_as::<_, MediaItem>(
            r"SELECT * FROM media_items WHERE remote_source = ?",
        )
        .bind(remote_source)
        .fetch_one(self.db.pool())
        .await?;

        Ok(item)
    }

    #[instrument(skip(self))]
    async fn get(&self, id: i64) -> Result<Option<MediaItem>, StoreError> {
        let item = sqlx::query_as::<_, MediaItem>(r"SELECT * FROM media_items WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(item)
    }

    #[instrument(skip(self))]
    async fn list(&self) -> Result<Vec<MediaItem>, StoreError> {
        let items =
            sqlx::query_as::<_, MediaItem>(r"SELECT * FROM media_items ORDER BY id ASC")
                .fetch_all(self.db.pool())
                .await?;

        Ok(items)
    }

    #[instrument(skip(self))]
    async fn mark_waiting(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"UPDATE media_items
              SET status = 'waiting',
                  last_error = NULL,
                  percent_complete = 0,
                  updated_at = datetime('now')
              WHERE id = ? AND status IN ('not_started', 'failed')",
        )
        .bind(id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.transition_rejected(id, "waiting").await);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_downloading(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"UPDATE media_items
              SET status = 'downloading',
                  percent_complete = 0,
                  updated_at = datetime('now')
              WHERE id = ? AND status = 'waiting'",
        )
        .bind(id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.transition_rejected(id, "downloading").await);
        }
        Ok(())
    }

    #[instrument(skip(self, local_path), fields(local_path = %local_path.display()))]
    async fn mark_downloaded(&self, id: i64, local_path: &Path) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"UPDATE media_items
              SET status = 'downloaded',
                  local_path = ?,
                  last_error = NULL,
                  percent_complete = 100,
                  updated_at = datetime('now')
              WHERE id = ? AND status = 'downloading'",
        )
        .bind(local_path.to_string_lossy().into_owned())
        .bind(id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.transition_rejected(id, "downloaded").await);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(reason = %reason))]
    async fn mark_failed(&self, id: i64, reason: &str) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"UPDATE media_items
              SET status = 'failed',
                  local_path = NULL,
                  last_error = ?,
                  percent_complete = 0,
                  updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(reason)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ItemNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_percent(&self, id: i64, percent: f64) -> Result<(), StoreError> {
        let clamped = percent.clamp(0.0, 100.0);

        // Guarded on status so a late progress tick cannot overwrite the
        // pinned 100 of a finalized row; zero rows affected is not an error.
        sqlx::query(
            r"UPDATE media_items
              SET percent_complete = ?, updated_at = datetime('now')
              WHERE id = ? AND status = 'downloading'",
        )
        .bind(clamped)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn reset(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"UPDATE media_items
              SET status = 'not_started',
                  local_path = NULL,
                  last_error = NULL,
                  percent_complete = 0,
                  updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ItemNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn recover_interrupted(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r"UPDATE media_items
              SET status = 'not_started',
                  percent_complete = 0,
                  updated_at = datetime('now')
              WHERE status IN ('waiting', 'downloading')",
        )
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected())
    }
}
