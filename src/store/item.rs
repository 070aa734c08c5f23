//! Media item types and download lifecycle states.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Download lifecycle state of a media item.
///
/// The `Downloaded` case carries the finalized file path so "a local path
/// exists if and only if the item is downloaded" holds by construction
/// rather than by convention. `Failed` carries the terminal error so a
/// stalled item is distinguishable from one that was never started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DownloadStatus {
    /// No download has been requested for this item.
    NotStarted,
    /// Queued behind the active transfer.
    Waiting,
    /// The single active transfer belongs to this item.
    Downloading,
    /// Transfer finished and the file was finalized to stable storage.
    Downloaded {
        /// Path of the finalized local file.
        local_path: PathBuf,
    },
    /// Transfer or finalization failed; the item may be re-enqueued.
    Failed {
        /// Human-readable description of the terminal failure.
        reason: String,
    },
}

impl DownloadStatus {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Waiting => "waiting",
            Self::Downloading => "downloading",
            Self::Downloaded { .. } => "downloaded",
            Self::Failed { .. } => "failed",
        }
    }

    /// True when a download may be requested for an item in this state.
    ///
    /// Only items that were never started or that failed are eligible;
    /// enqueueing anything else is a no-op.
    #[must_use]
    pub fn is_enqueueable(&self) -> bool {
        matches!(self, Self::NotStarted | Self::Failed { .. })
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single media item in the catalog store.
///
/// The row keeps status as a string column plus optional `local_path` /
/// `last_error` columns; [`status()`](Self::status) projects them into the
/// tagged [`DownloadStatus`] enum.
#[derive(Debug, Clone, FromRow)]
pub struct MediaItem {
    /// Unique identifier, stable across the item's lifetime.
    pub id: i64,
    /// URL of the online media.
    pub remote_source: String,
    /// Current lifecycle state (stored as text, parsed via `status()`).
    #[sqlx(rename = "status")]
    pub status_str: String,
    /// Finalized local file path, present only once downloaded.
    pub local_path: Option<String>,
    /// Last terminal failure message, present only when failed.
    pub last_error: Option<String>,
    /// Download progress percentage in `[0, 100]`.
    pub percent_complete: f64,
    /// When the item was created.
    pub created_at: String,
    /// When the item was last updated.
    pub updated_at: String,
}

impl MediaItem {
    /// Returns the parsed lifecycle status.
    ///
    /// A `downloaded` row without a stored path cannot represent a usable
    /// offline copy, so it degrades to `NotStarted`, as does any
    /// unrecognized status string.
    #[must_use]
    pub fn status(&self) -> DownloadStatus {
        match self.status_str.as_str() {
            "waiting" => DownloadStatus::Waiting,
            "downloading" => DownloadStatus::Downloading,
            "downloaded" => match &self.local_path {
                Some(path) => DownloadStatus::Downloaded {
                    local_path: PathBuf::from(path),
                },
                None => DownloadStatus::NotStarted,
            },
            "failed" => DownloadStatus::Failed {
                reason: self
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            },
            _ => DownloadStatus::NotStarted,
        }
    }

    /// Returns the finalized local path when the item is downloaded.
    #[must_use]
    pub fn local_path(&self) -> Option<&Path> {
        match self.status_str.as_str() {
            "downloaded" => self.local_path.as_deref().map(Path::new),
            _ => None,
        }
    }
}

impl fmt::Display for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MediaItem {{ id: {}, remote_source: {}, status: {} }}",
            self.id,
            self.remote_source,
            self.status()
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item_with(status: &str, local_path: Option<&str>, last_error: Option<&str>) -> MediaItem {
        MediaItem {
            id: 1,
            remote_source: "https://example.com/a.mp4".to_string(),
            status_str: status.to_string(),
            local_path: local_path.map(String::from),
            last_error: last_error.map(String::from),
            percent_complete: 0.0,
            created_at: "2026-01-01".to_string(),
            updated_at: "2026-01-01".to_string(),
        }
    }

    #[test]
    fn test_status_as_str_round_trips_simple_states() {
        assert_eq!(DownloadStatus::NotStarted.as_str(), "not_started");
        assert_eq!(DownloadStatus::Waiting.as_str(), "waiting");
        assert_eq!(DownloadStatus::Downloading.as_str(), "downloading");
    }

    #[test]
    fn test_status_downloaded_carries_path() {
        let item = item_with("downloaded", Some("/videos/a.mp4"), None);
        assert_eq!(
            item.status(),
            DownloadStatus::Downloaded {
                local_path: PathBuf::from("/videos/a.mp4")
            }
        );
        assert_eq!(item.local_path(), Some(Path::new("/videos/a.mp4")));
    }

    #[test]
    fn test_status_downloaded_without_path_degrades_to_not_started() {
        let item = item_with("downloaded", None, None);
        assert_eq!(item.status(), DownloadStatus::NotStarted);
        assert!(item.local_path().is_none());
    }

    #[test]
    fn test_status_failed_carries_reason() {
        let item = item_with("failed", None, Some("HTTP 404"));
        assert_eq!(
            item.status(),
            DownloadStatus::Failed {
                reason: "HTTP 404".to_string()
            }
        );
    }

    #[test]
    fn test_status_failed_without_message_uses_placeholder() {
        let item = item_with("failed", None, None);
        let DownloadStatus::Failed { reason } = item.status() else {
            panic!("expected failed status");
        };
        assert_eq!(reason, "unknown error");
    }

    #[test]
    fn test_status_unknown_string_falls_back_to_not_started() {
        let item = item_with("garbage", None, None);
        assert_eq!(item.status(), DownloadStatus::NotStarted);
    }

    #[test]
    fn test_local_path_hidden_outside_downloaded_state() {
        // A stale path column must not leak through while e.g. re-downloading.
        let item = item_with("downloading", Some("/videos/a.mp4"), None);
        assert!(item.local_path().is_none());
    }

    #[test]
    fn test_is_enqueueable() {
        assert!(DownloadStatus::NotStarted.is_enqueueable());
        assert!(
            DownloadStatus::Failed {
                reason: "x".to_string()
            }
            .is_enqueueable()
        );
        assert!(!DownloadStatus::Waiting.is_enqueueable());
        assert!(!DownloadStatus::Downloading.is_enqueueable());
        assert!(
            !DownloadStatus::Downloaded {
                local_path: PathBuf::from("/v/a.mp4")
            }
            .is_enqueueable()
        );
    }

    #[test]
    fn test_status_serde_uses_snake_case_tag() {
        let json = serde_json::to_string(&DownloadStatus::Waiting).unwrap();
        assert_eq!(json, r#"{"state":"waiting"}"#);

        let status = DownloadStatus::Downloaded {
            local_path: PathBuf::from("/videos/a.mp4"),
        };
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains(r#""state":"downloaded""#));
        assert!(json.contains("a.mp4"));
    }

    #[test]
    fn test_media_item_display() {
        let item = item_with("waiting", None, None);
        let display = item.to_string();
        assert!(display.contains("example.com"));
        assert!(display.contains("waiting"));
    }
}
