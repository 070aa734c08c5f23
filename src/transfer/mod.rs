//! Byte-transfer backend for streaming remote media to local spool files.
//!
//! A backend performs the actual transfer on its own I/O task and reports
//! back through a [`TransferHandle`]: zero or more [`TransferEvent::Progress`]
//! events followed by exactly one terminal event, either
//! [`TransferEvent::Complete`] with the spooled temporary file or
//! [`TransferEvent::Failed`]. The queue manager never touches sockets or
//! spool files itself; it only consumes this event stream.
//!
//! [`HttpTransfer`] is the production backend; tests substitute scripted
//! implementations of [`TransferBackend`].

mod error;
mod http;

pub use error::TransferError;
pub use http::HttpTransfer;

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Buffered events per in-flight transfer.
///
/// Progress is produced per received chunk, far faster than the manager
/// propagates it; the buffer absorbs bursts without backpressuring the
/// socket read loop.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A single report from an in-flight transfer.
#[derive(Debug)]
pub enum TransferEvent {
    /// Bytes arrived since the last report.
    Progress {
        /// Bytes written by the latest chunk.
        bytes_written: u64,
        /// Total bytes written so far.
        total_written: u64,
        /// Expected total size, when the server advertised one.
        total_expected: Option<u64>,
    },
    /// The transfer finished; the payload sits in a temporary spool file.
    Complete {
        /// Location of the fully written temporary file.
        temp_path: PathBuf,
    },
    /// The transfer failed terminally.
    Failed {
        /// What went wrong.
        error: TransferError,
    },
}

/// Receiving side of one transfer's event stream.
///
/// Contract: zero or more `Progress` events, then exactly one terminal
/// event (`Complete` or `Failed`), then the stream ends.
#[derive(Debug)]
pub struct TransferHandle {
    events: mpsc::Receiver<TransferEvent>,
}

impl TransferHandle {
    /// Creates a handle along with the sender the transfer task reports to.
    #[must_use]
    pub fn channel() -> (mpsc::Sender<TransferEvent>, Self) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        (tx, Self { events: rx })
    }

    /// Receives the next event, or `None` once the stream has ended.
    pub async fn recv(&mut self) -> Option<TransferEvent> {
        self.events.recv().await
    }

    /// Consumes the handle, returning the raw event receiver.
    #[must_use]
    pub fn into_receiver(self) -> mpsc::Receiver<TransferEvent> {
        self.events
    }
}

/// Starts byte transfers from remote URLs.
#[async_trait]
pub trait TransferBackend: Send + Sync {
    /// Begins transferring `url`, returning the event stream for it.
    ///
    /// The transfer itself runs on a separate task; this call only
    /// validates the request and wires up the stream.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InvalidUrl`] when the URL cannot be parsed.
    /// Transfer failures after startup arrive as [`TransferEvent::Failed`].
    async fn start_transfer(&self, url: &str) -> Result<TransferHandle, TransferError>;
}
