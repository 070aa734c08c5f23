//! Download queue manager: the serialized single-flight download pipeline.
//!
//! The manager owns an ordered backlog of pending items and enforces
//! at-most-one active transfer. All queue state lives on one worker task;
//! callers and transfer tasks communicate with it exclusively through
//! messages, so no two events can ever mutate queue state concurrently.
//!
//! # Lifecycle
//!
//! `enqueue` marks an eligible item `Waiting` and appends it to the backlog.
//! When idle, the worker pops the head, marks it `Downloading`, and starts a
//! transfer on the backend. Progress reports are throttled and republished
//! on a watch channel. On completion the spooled file is finalized into the
//! destination directory, the item becomes `Downloaded`, and the queue
//! advances. Any terminal failure marks the item `Failed` and the queue
//! still advances, so one bad item never stalls the rest.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use offliner_core::{
//!     Database, DownloadManager, HttpTransfer, ItemStore, QueueConfig, SqliteStore,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new_in_memory().await?;
//! let store = Arc::new(SqliteStore::new(db));
//! let backend = Arc::new(HttpTransfer::new("videos/.spool")?);
//! let manager = DownloadManager::spawn(store.clone(), backend, QueueConfig::new("videos"));
//!
//! let item = store.add("https://example.com/a.mp4").await?;
//! manager.enqueue(item.id);
//! # Ok(())
//! # }
//! ```

mod error;
mod finalize;

pub use error::DownloadError;

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::store::ItemStore;
use crate::transfer::{TransferBackend, TransferEvent};

/// Minimum time between propagated progress updates for one transfer.
///
/// Byte callbacks arrive per chunk; without the throttle every chunk would
/// hit the watch channel and the store.
pub const DEFAULT_PROGRESS_THROTTLE: Duration = Duration::from_millis(700);

/// Buffered queue events per subscriber before lagging.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for a [`DownloadManager`].
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Directory finished media is finalized into.
    pub destination_dir: PathBuf,
    /// Minimum interval between propagated progress updates.
    pub progress_throttle: Duration,
}

impl QueueConfig {
    /// Creates a config with the default progress throttle.
    #[must_use]
    pub fn new(destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            destination_dir: destination_dir.into(),
            progress_throttle: DEFAULT_PROGRESS_THROTTLE,
        }
    }

    /// Overrides the progress throttle window.
    #[must_use]
    pub fn with_progress_throttle(mut self, window: Duration) -> Self {
        self.progress_throttle = window;
        self
    }
}

/// Lifecycle notifications broadcast by the manager.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// An item's transfer started.
    Started {
        /// The item that became active.
        id: i64,
    },
    /// An item finished and was finalized.
    Completed {
        /// The item that completed.
        id: i64,
        /// Where the finished file lives.
        local_path: PathBuf,
    },
    /// An item failed terminally; the queue has already advanced past it.
    Failed {
        /// The item that failed.
        id: i64,
        /// The persisted failure reason.
        reason: String,
    },
    /// The backlog drained and no transfer is active.
    Idle,
}

/// Point-in-time view of the queue, for status displays.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    /// Backlog item ids in FIFO order.
    pub backlog: Vec<i64>,
    /// The active item, if a transfer is in flight.
    pub active: Option<i64>,
}

impl QueueSnapshot {
    /// True when nothing is queued or in flight.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.active.is_none() && self.backlog.is_empty()
    }
}

/// Messages processed by the worker task.
enum Msg {
    Enqueue { id: i64 },
    Snapshot { reply: oneshot::Sender<QueueSnapshot> },
    Transfer { id: i64, event: TransferEvent },
}

/// Handle to the queue worker.
///
/// Cheap to clone; all clones talk to the same worker. Constructed
/// explicitly and injected where needed — there is no global instance.
#[derive(Debug, Clone)]
pub struct DownloadManager {
    inbox: mpsc::UnboundedSender<Msg>,
    progress: watch::Receiver<f64>,
    events: broadcast::Sender<QueueEvent>,
}

impl DownloadManager {
    /// Spawns the worker task and returns a handle to it.
    ///
    /// The worker runs until every handle is dropped.
    #[must_use]
    pub fn spawn(
        store: Arc<dyn ItemStore>,
        backend: Arc<dyn TransferBackend>,
        config: QueueConfig,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = watch::channel(0.0);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let worker = Worker {
            store,
            backend,
            config,
            backlog: VecDeque::new(),
            active: None,
            inbox: inbox_tx.clone(),
            progress: progress_tx,
            events: events_tx.clone(),
        };
        tokio::spawn(worker.run(inbox_rx));

        Self {
            inbox: inbox_tx,
            progress: progress_rx,
            events: events_tx,
        }
    }

    /// Requests a download for the item.
    ///
    /// Never blocks and never fails from the caller's perspective: a
    /// duplicate request, an unknown id, or a persistence problem is logged
    /// (and, where terminal, surfaced on the event channel) instead of
    /// propagating.
    pub fn enqueue(&self, id: i64) {
        if self.inbox.send(Msg::Enqueue { id }).is_err() {
            warn!(item_id = id, "queue worker is gone; dropping enqueue request");
        }
    }

    /// Observable progress of the active transfer, a fraction in `[0, 1]`.
    ///
    /// Updated at most once per throttle window while a transfer is active
    /// and reset to 0 between transfers.
    #[must_use]
    pub fn progress(&self) -> watch::Receiver<f64> {
        self.progress.clone()
    }

    /// Subscribes to queue lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Returns the current backlog and active item.
    ///
    /// `None` when the worker has shut down.
    pub async fn snapshot(&self) -> Option<QueueSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.inbox.send(Msg::Snapshot { reply: tx }).ok()?;
        rx.await.ok()
    }
}

/// The single transfer currently in flight.
struct ActiveTransfer {
    id: i64,
    remote_source: String,
    /// When the last progress update was propagated, for throttling.
    last_propagated: Option<Instant>,
}

/// A backlog entry. The remote source is captured at enqueue time so
/// advancing the queue never depends on a store read.
struct QueuedItem {
    id: i64,
    remote_source: String,
}

/// Exclusive owner of all queue state; lives on one task.
struct Worker {
    store: Arc<dyn ItemStore>,
    backend: Arc<dyn TransferBackend>,
    config: QueueConfig,
    backlog: VecDeque<QueuedItem>,
    active: Option<ActiveTransfer>,
    /// Cloned into forwarder tasks so transfer events arrive as messages.
    inbox: mpsc::UnboundedSender<Msg>,
    progress: watch::Sender<f64>,
    events: broadcast::Sender<QueueEvent>,
}

impl Worker {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Msg>) {
        while let Some(msg) = inbox.recv().await {
            match msg {
                Msg::Enqueue { id } => self.handle_enqueue(id).await,
                Msg::Snapshot { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                Msg::Transfer { id, event } => self.handle_transfer_event(id, event).await,
            }
        }
        debug!("queue worker shutting down");
    }

    fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            backlog: self.backlog.iter().map(|q| q.id).collect(),
            active: self.active.as_ref().map(|a| a.id),
        }
    }

    async fn handle_enqueue(&mut self, id: i64) {
        // The status guard below covers persisted states; the membership
        // check covers an item whose mark_waiting write failed and which
        // therefore still reads as eligible while sitting in the backlog.
        if self.backlog.iter().any(|q| q.id == id)
            || self.active.as_ref().is_some_and(|a| a.id == id)
        {
            debug!(item_id = id, "item already queued");
            return;
        }

        let item = match self.store.get(id).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                warn!(item_id = id, "enqueue requested for unknown item");
                return;
            }
            Err(error) => {
                warn!(item_id = id, error = %error, "failed to read item for enqueue");
                return;
            }
        };

        if !item.status().is_enqueueable() {
            debug!(item_id = id, status = %item.status(), "enqueue is a no-op");
            return;
        }

        if let Err(error) = self.store.mark_waiting(id).await {
            warn!(item_id = id, error = %error, "failed to persist waiting status");
        }
        self.backlog.push_back(QueuedItem {
            id,
            remote_source: item.remote_source,
        });
        debug!(item_id = id, backlog = self.backlog.len(), "item queued");

        if self.active.is_none() {
            self.advance().await;
        }
    }

    /// Pops backlog entries until a transfer starts or the backlog empties.
    ///
    /// An entry that fails to start is marked failed and skipped, so a
    /// broken head entry can never wedge the queue.
    async fn advance(&mut self) {
        while let Some(next) = self.backlog.pop_front() {
            let id = next.id;
            match self.start_item(next).await {
                Ok(active) => {
                    info!(item_id = id, "download started");
                    let _ = self.events.send(QueueEvent::Started { id });
                    self.active = Some(active);
                    return;
                }
                Err(error) => {
                    warn!(item_id = id, error = %error, "failed to start download");
                    self.fail_item(id, &error.to_string()).await;
                }
            }
        }

        self.active = None;
        let _ = self.progress.send(0.0);
        debug!("backlog drained; queue idle");
        let _ = self.events.send(QueueEvent::Idle);
    }

    async fn start_item(&mut self, next: QueuedItem) -> Result<ActiveTransfer, DownloadError> {
        let QueuedItem { id, remote_source } = next;

        self.store.mark_downloading(id).await?;
        let handle = self.backend.start_transfer(&remote_source).await?;

        // Forward transfer events into the worker inbox so all queue state
        // stays confined to this task.
        let inbox = self.inbox.clone();
        let mut events = handle.into_receiver();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if inbox.send(Msg::Transfer { id, event }).is_err() {
                    break;
                }
            }
        });

        Ok(ActiveTransfer {
            id,
            remote_source,
            last_propagated: None,
        })
    }

    async fn fail_item(&mut self, id: i64, reason: &str) {
        if let Err(error) = self.store.mark_failed(id, reason).await {
            warn!(item_id = id, error = %error, "failed to persist failure status");
        }
        let _ = self.events.send(QueueEvent::Failed {
            id,
            reason: reason.to_string(),
        });
    }

    async fn handle_transfer_event(&mut self, id: i64, event: TransferEvent) {
        let Some(active_id) = self.active.as_ref().map(|a| a.id) else {
            debug!(item_id = id, "dropping transfer event with no active item");
            return;
        };
        if active_id != id {
            debug!(
                item_id = id,
                active_id, "dropping transfer event from a stale transfer"
            );
            return;
        }

        match event {
            TransferEvent::Progress {
                total_written,
                total_expected,
                ..
            } => {
                self.handle_progress(id, total_written, total_expected).await;
            }
            TransferEvent::Complete { temp_path } => {
                // Guarded above; the active slot is cleared before any
                // further queue work happens.
                if let Some(active) = self.active.take() {
                    self.finish_item(active, temp_path).await;
                }
            }
            TransferEvent::Failed { error } => {
                self.active = None;
                let reason = DownloadError::from(error).to_string();
                warn!(item_id = id, reason, "download failed");
                self.fail_item(id, &reason).await;
                let _ = self.progress.send(0.0);
                self.advance().await;
            }
        }
    }

    async fn handle_progress(&mut self, id: i64, total_written: u64, total_expected: Option<u64>) {
        // Unknown or zero expected size reads as no measurable progress.
        let fraction = match total_expected {
            Some(expected) if expected > 0 => {
                (total_written as f64 / expected as f64).clamp(0.0, 1.0)
            }
            _ => 0.0,
        };

        let throttle = self.config.progress_throttle;
        let Some(active) = self.active.as_mut() else {
            return;
        };

        let now = Instant::now();
        if active
            .last_propagated
            .is_some_and(|last| now.duration_since(last) < throttle)
        {
            return;
        }
        active.last_propagated = Some(now);

        let _ = self.progress.send(fraction);

        // Percentage persistence is opportunistic: a failed write costs a
        // stale UI read, not the transfer.
        let percent = (fraction * 100.0).ceil();
        if let Err(error) = self.store.set_percent(id, percent).await {
            debug!(item_id = id, error = %error, "failed to persist progress percentage");
        }
    }

    async fn finish_item(&mut self, active: ActiveTransfer, temp_path: PathBuf) {
        match finalize::finalize_download(
            &temp_path,
            &self.config.destination_dir,
            &active.remote_source,
        )
        .await
        {
            Ok(destination) => {
                if let Err(error) = self.store.mark_downloaded(active.id, &destination).await {
                    warn!(
                        item_id = active.id,
                        error = %error,
                        "failed to persist downloaded status"
                    );
                }
                info!(
                    item_id = active.id,
                    path = %destination.display(),
                    "download completed"
                );
                let _ = self.events.send(QueueEvent::Completed {
                    id: active.id,
                    local_path: destination,
                });
            }
            Err(error) => {
                // The file never reached stable storage, so the item must
                // not read as downloaded.
                warn!(item_id = active.id, error = %error, "failed to finalize download");
                self.fail_item(active.id, &error.to_string()).await;
            }
        }

        let _ = self.progress.send(0.0);
        self.advance().await;
    }
}
