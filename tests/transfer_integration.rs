//! Integration tests for the HTTP transfer backend, using wiremock.

use offliner_core::{HttpTransfer, TransferBackend, TransferError, TransferEvent};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup() -> (MockServer, HttpTransfer, TempDir) {
    let server = MockServer::start().await;
    let temp = TempDir::new().expect("failed to create temp dir");
    let backend = HttpTransfer::new(temp.path().join("spool")).expect("failed to build backend");
    (server, backend, temp)
}

/// Drains a transfer, returning all progress events and the terminal event.
async fn drain(
    mut handle: offliner_core::TransferHandle,
) -> (Vec<TransferEvent>, TransferEvent) {
    let mut progress = Vec::new();
    loop {
        let event = tokio::time::timeout(std::time::Duration::from_secs(10), handle.recv())
            .await
            .expect("timed out waiting for transfer event")
            .expect("transfer ended without a terminal event");
        match event {
            TransferEvent::Progress { .. } => progress.push(event),
            terminal => return (progress, terminal),
        }
    }
}

#[tokio::test]
async fn test_successful_transfer_streams_body_to_spool_file() {
    let (server, backend, _temp) = setup().await;
    let body = b"0123456789abcdef".to_vec();

    Mock::given(method("GET"))
        .and(path("/movies/a.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let url = format!("{}/movies/a.mp4", server.uri());
    let handle = backend.start_transfer(&url).await.unwrap();
    let (progress, terminal) = drain(handle).await;

    let TransferEvent::Complete { temp_path } = terminal else {
        panic!("expected Complete, got {terminal:?}");
    };
    assert_eq!(tokio::fs::read(&temp_path).await.unwrap(), body);
    let name = temp_path.file_name().unwrap().to_string_lossy();
    assert!(name.ends_with("a.mp4.part"), "unexpected spool name: {name}");

    // Byte counts are cumulative and end at the full body length.
    assert!(!progress.is_empty());
    let mut last = 0u64;
    for event in &progress {
        let TransferEvent::Progress {
            total_written,
            total_expected,
            ..
        } = event
        else {
            unreachable!()
        };
        assert!(*total_written >= last);
        assert_eq!(*total_expected, Some(body.len() as u64));
        last = *total_written;
    }
    assert_eq!(last, body.len() as u64);
}

#[tokio::test]
async fn test_http_error_status_fails_the_transfer() {
    let (server, backend, temp) = setup().await;

    Mock::given(method("GET"))
        .and(path("/movies/missing.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let url = format!("{}/movies/missing.mp4", server.uri());
    let handle = backend.start_transfer(&url).await.unwrap();
    let (progress, terminal) = drain(handle).await;

    assert!(progress.is_empty());
    let TransferEvent::Failed { error } = terminal else {
        panic!("expected Failed, got {terminal:?}");
    };
    assert!(matches!(
        error,
        TransferError::HttpStatus { status: 404, .. }
    ));

    // No stray partial files are left behind.
    let mut entries = tokio::fs::read_dir(temp.path().join("spool")).await.unwrap();
    assert!(entries.next_entry().await.unwrap().is_none());
}

#[tokio::test]
async fn test_connection_refused_surfaces_as_network_error() {
    let temp = TempDir::new().unwrap();
    let backend = HttpTransfer::new(temp.path().join("spool")).unwrap();

    // Nothing is listening on this port.
    let handle = backend
        .start_transfer("http://127.0.0.1:9/unreachable.mp4")
        .await
        .unwrap();
    let (_, terminal) = drain(handle).await;

    let TransferEvent::Failed { error } = terminal else {
        panic!("expected Failed, got {terminal:?}");
    };
    assert!(matches!(
        error,
        TransferError::Network { .. } | TransferError::Timeout { .. }
    ));
}

#[tokio::test]
async fn test_invalid_url_is_rejected_before_any_transfer() {
    let temp = TempDir::new().unwrap();
    let backend = HttpTransfer::new(temp.path().join("spool")).unwrap();

    let result = backend.start_transfer("not a url at all").await;
    assert!(matches!(result, Err(TransferError::InvalidUrl { .. })));
}

#[tokio::test]
async fn test_concurrent_transfers_use_distinct_spool_files() {
    let (server, backend, _temp) = setup().await;

    Mock::given(method("GET"))
        .and(path("/movies/a.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"aaaa".to_vec()))
        .mount(&server)
        .await;

    let url = format!("{}/movies/a.mp4", server.uri());
    let first = backend.start_transfer(&url).await.unwrap();
    let second = backend.start_transfer(&url).await.unwrap();

    let (_, first_terminal) = drain(first).await;
    let (_, second_terminal) = drain(second).await;
    let (TransferEvent::Complete { temp_path: a }, TransferEvent::Complete { temp_path: b }) =
        (first_terminal, second_terminal)
    else {
        panic!("both transfers should complete");
    };
    assert_ne!(a, b);
}
