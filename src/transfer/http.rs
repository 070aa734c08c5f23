//! HTTP transfer backend streaming responses to spool files.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};
use url::Url;

use super::{TransferBackend, TransferError, TransferEvent, TransferHandle};
use crate::filename::filename_from_url;

/// Connection timeout for transfer requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Read timeout for transfer requests. Media files are large; the read
/// timeout applies per chunk, not to the whole body.
const READ_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP transfer backend.
///
/// Streams response bodies chunk by chunk into `<spool_dir>/<n>-<name>.part`
/// and reports progress through the transfer handle. The spool directory
/// should live on the same filesystem as the final destination so the
/// finalizing rename stays atomic.
#[derive(Debug)]
pub struct HttpTransfer {
    client: reqwest::Client,
    spool_dir: PathBuf,
    /// Monotonic counter disambiguating spool files for repeated names.
    sequence: AtomicU64,
}

impl HttpTransfer {
    /// Creates a backend spooling into the given directory.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Io`] when the HTTP client cannot be built.
    pub fn new(spool_dir: impl Into<PathBuf>) -> Result<Self, TransferError> {
        let spool_dir = spool_dir.into();
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(READ_TIMEOUT)
            .build()
            .map_err(|e| TransferError::Io {
                path: spool_dir.clone(),
                source: std::io::Error::other(e),
            })?;

        Ok(Self {
            client,
            spool_dir,
            sequence: AtomicU64::new(0),
        })
    }

    fn next_spool_path(&self, url: &str) -> PathBuf {
        let name = filename_from_url(url);
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.spool_dir.join(format!("{seq}-{name}.part"))
    }
}

#[async_trait]
impl TransferBackend for HttpTransfer {
    #[instrument(skip(self), fields(url = %url))]
    async fn start_transfer(&self, url: &str) -> Result<TransferHandle, TransferError> {
        Url::parse(url).map_err(|_| TransferError::invalid_url(url))?;

        tokio::fs::create_dir_all(&self.spool_dir)
            .await
            .map_err(|e| TransferError::io(self.spool_dir.clone(), e))?;

        let (events, handle) = TransferHandle::channel();
        let client = self.client.clone();
        let spool_path = self.next_spool_path(url);
        let url = url.to_string();

        tokio::spawn(async move {
            match run_transfer(&client, &url, &spool_path, &events).await {
                Ok(temp_path) => {
                    debug!(url = %url, path = %temp_path.display(), "transfer complete");
                    if events
                        .send(TransferEvent::Complete { temp_path })
                        .await
                        .is_err()
                    {
                        debug!(url = %url, "transfer consumer dropped before completion");
                    }
                }
                Err(error) => {
                    warn!(url = %url, error = %error, "transfer failed");
                    // Partial spool data is useless without resume support.
                    let _ = tokio::fs::remove_file(&spool_path).await;
                    let _ = events.send(TransferEvent::Failed { error }).await;
                }
            }
        });

        Ok(handle)
    }
}

/// Streams the response body to the spool file, emitting progress events.
async fn run_transfer(
    client: &reqwest::Client,
    url: &str,
    spool_path: &Path,
    events: &mpsc::Sender<TransferEvent>,
) -> Result<PathBuf, TransferError> {
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            TransferError::timeout(url)
        } else {
            TransferError::network(url, e)
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransferError::http_status(url, status.as_u16()));
    }

    let total_expected = response.content_length();

    let file = File::create(spool_path)
        .await
        .map_err(|e| TransferError::io(spool_path.to_path_buf(), e))?;
    let mut writer = BufWriter::new(file);

    let mut stream = response.bytes_stream();
    let mut total_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| {
            if e.is_timeout() {
                TransferError::timeout(url)
            } else {
                TransferError::network(url, e)
            }
        })?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| TransferError::io(spool_path.to_path_buf(), e))?;

        total_written += chunk.len() as u64;
        let progress = TransferEvent::Progress {
            bytes_written: chunk.len() as u64,
            total_written,
            total_expected,
        };
        if events.send(progress).await.is_err() {
            // Consumer went away; stop wasting bandwidth.
            return Err(TransferError::io(
                spool_path.to_path_buf(),
                std::io::Error::other("transfer consumer dropped"),
            ));
        }
    }

    // Ensure all data is flushed to disk before handing the file over.
    writer
        .flush()
        .await
        .map_err(|e| TransferError::io(spool_path.to_path_buf(), e))?;

    Ok(spool_path.to_path_buf())
}
