//! Error types for item store operations.

use thiserror::Error;

/// Errors that can occur while reading or persisting media items.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {message}")]
    Database {
        /// Human-readable database error text.
        message: String,
    },

    /// Media item not found.
    #[error("media item not found: id {0}")]
    ItemNotFound(i64),

    /// A lifecycle transition was attempted from the wrong state.
    #[error("invalid transition for item {id}: cannot move from '{from}' to '{to}'")]
    InvalidTransition {
        /// The item whose transition was rejected.
        id: i64,
        /// Status the item was actually in.
        from: String,
        /// Status the caller tried to move it to.
        to: String,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            message: err.to_string(),
        }
    }
}

impl StoreError {
    /// Creates an `InvalidTransition` error.
    #[must_use]
    pub fn invalid_transition(id: i64, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidTransition {
            id,
            from: from.into(),
            to: to.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_database_message() {
        let err = StoreError::Database {
            message: "connection failed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("database error"));
        assert!(msg.contains("connection failed"));
    }

    #[test]
    fn test_store_error_item_not_found_message() {
        let err = StoreError::ItemNotFound(42);
        let msg = err.to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains("42"));
    }

    #[test]
    fn test_store_error_invalid_transition_message() {
        let err = StoreError::invalid_transition(7, "downloaded", "downloading");
        let msg = err.to_string();
        assert!(msg.contains("invalid transition"));
        assert!(msg.contains("7"));
        assert!(msg.contains("downloaded"));
        assert!(msg.contains("downloading"));
    }

    #[test]
    fn test_store_error_clone() {
        let err = StoreError::ItemNotFound(123);
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
