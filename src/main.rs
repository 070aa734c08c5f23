//! CLI entry point for the offliner tool.

use std::collections::HashSet;
use std::io::{self, IsTerminal, Read};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use offliner_core::{
    Database, DownloadManager, DownloadStatus, HttpTransfer, ItemStore, QueueConfig, QueueEvent,
    SqliteStore,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

mod cli;
mod progress;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");
    info!("Offliner starting");

    // Read input: from positional args or stdin
    let input_text = if args.urls.is_empty() {
        if io::stdin().is_terminal() {
            info!("No input provided. Pipe URLs via stdin or pass as arguments.");
            info!("Example: echo 'https://example.com/movie.mp4' | offliner");
            return Ok(());
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        args.urls.join("\n")
    };

    let mut urls = Vec::new();
    for line in input_text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if Url::parse(line).is_ok() {
            urls.push(line.to_string());
        } else {
            warn!(skipped = %line, "Skipped unrecognized input");
        }
    }

    if urls.is_empty() {
        info!("No valid URLs found in input");
        return Ok(());
    }
    info!(urls = urls.len(), "Parsed input");

    // Initialize the catalog store under a state directory in the output dir
    tokio::fs::create_dir_all(&args.output_dir).await?;
    let state_dir = args.output_dir.join(".offliner");
    tokio::fs::create_dir_all(&state_dir).await?;

    let db = Database::new(&state_dir.join("catalog.db")).await?;
    let store = Arc::new(SqliteStore::new(db));

    // Partial downloads do not survive restarts; reset anything a previous
    // run left in flight.
    let recovered = store.recover_interrupted().await?;
    if recovered > 0 {
        info!(recovered, "Recovered interrupted items from previous run");
    }

    // Spool next to the destination so finalization renames stay on one filesystem
    let backend = Arc::new(HttpTransfer::new(state_dir.join("spool"))?);
    let config = QueueConfig::new(&args.output_dir)
        .with_progress_throttle(Duration::from_millis(args.throttle_ms));
    let manager = DownloadManager::spawn(store.clone(), backend, config);

    // Subscribe before enqueueing so no terminal event can be missed
    let mut events = manager.subscribe();

    let mut pending = HashSet::new();
    for url in &urls {
        let item = store.add(url).await?;
        if let DownloadStatus::Downloaded { local_path } = item.status() {
            info!(url = %url, path = %local_path.display(), "Already downloaded; skipping");
            continue;
        }
        pending.insert(item.id);
        manager.enqueue(item.id);
    }

    let (progress_handle, stop) =
        progress::spawn_progress_ui(!args.no_progress && !args.quiet, manager.progress());

    let mut completed = 0usize;
    let mut failed = 0usize;
    while !pending.is_empty() {
        match events.recv().await {
            Ok(QueueEvent::Completed { id, local_path }) => {
                if pending.remove(&id) {
                    completed += 1;
                    info!(item_id = id, path = %local_path.display(), "Download completed");
                }
            }
            Ok(QueueEvent::Failed { id, reason }) => {
                if pending.remove(&id) {
                    failed += 1;
                    warn!(item_id = id, reason, "Download failed");
                }
            }
            Ok(QueueEvent::Started { .. } | QueueEvent::Idle) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Event stream lagged; re-reading item states");
                let (c, f) = drain_terminal(store.as_ref(), &mut pending).await?;
                completed += c;
                failed += f;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = progress_handle {
        let _ = handle.await;
    }

    info!(completed, failed, total = completed + failed, "Run complete");

    if args.json {
        let mut rows = Vec::new();
        for url in &urls {
            // add() is idempotent per URL, so this is a plain lookup here
            let item = store.add(url).await?;
            rows.push(serde_json::json!({
                "id": item.id,
                "remote_source": item.remote_source,
                "status": item.status(),
                "percent_complete": item.percent_complete,
            }));
        }
        println!("{}", serde_json::to_string_pretty(&rows)?);
    }

    Ok(())
}

/// Removes items that already reached a terminal state from `pending`.
/// Fallback path for when the event stream lagged.
async fn drain_terminal(
    store: &SqliteStore,
    pending: &mut HashSet<i64>,
) -> Result<(usize, usize)> {
    let mut completed = 0usize;
    let mut failed = 0usize;
    let mut done = Vec::new();
    for &id in pending.iter() {
        if let Some(item) = store.get(id).await? {
            match item.status() {
                DownloadStatus::Downloaded { .. } => {
                    completed += 1;
                    done.push(id);
                }
                DownloadStatus::Failed { .. } => {
                    failed += 1;
                    done.push(id);
                }
                _ => {}
            }
        }
    }
    for id in done {
        pending.remove(&id);
    }
    Ok((completed, failed))
}
