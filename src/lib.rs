//! Offliner Core Library
//!
//! This library provides the core functionality for the offliner tool: a
//! serialized download queue that caches remote media for offline playback.
//! One transfer is active at any time; items move through a persisted
//! lifecycle (`not_started` → `waiting` → `downloading` → `downloaded` /
//! `failed`) and finished files are finalized into a stable directory.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`store`] - Durable media item catalog and lifecycle transitions
//! - [`transfer`] - Byte-transfer backends (HTTP streaming)
//! - [`manager`] - The single-flight download queue manager
//! - [`filename`] - Filename derivation from remote URLs

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod db;
pub mod filename;
pub mod manager;
pub mod store;
pub mod transfer;

// Re-export commonly used types
pub use db::Database;
pub use manager::{
    DEFAULT_PROGRESS_THROTTLE, DownloadError, DownloadManager, QueueConfig, QueueEvent,
    QueueSnapshot,
};
pub use store::{DownloadStatus, ItemStore, MediaItem, SqliteStore, StoreError};
pub use transfer::{
    HttpTransfer, TransferBackend, TransferError, TransferEvent, TransferHandle,
};
