//! End-to-end tests for the offliner binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[test]
fn test_help_shows_usage() {
    Command::cargo_bin("offliner")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("--output-dir"))
        .stdout(predicate::str::contains("--throttle-ms"));
}

#[test]
fn test_version_flag_works() {
    Command::cargo_bin("offliner")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("offliner"));
}

#[test]
fn test_empty_stdin_exits_cleanly() {
    Command::cargo_bin("offliner")
        .unwrap()
        .arg("--quiet")
        .write_stdin("")
        .assert()
        .success();
}

#[test]
fn test_unparseable_input_lines_are_skipped() {
    let temp = TempDir::new().unwrap();
    Command::cargo_bin("offliner")
        .unwrap()
        .args(["--quiet", "--output-dir"])
        .arg(temp.path())
        .write_stdin("this is not a url\n\n   \n")
        .assert()
        .success();
}

#[test]
fn test_invalid_throttle_is_rejected() {
    Command::cargo_bin("offliner")
        .unwrap()
        .args(["--throttle-ms", "999999", "https://x/a.mp4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--throttle-ms"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_downloads_url_and_reports_json_summary() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movies/feature.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"feature film".to_vec()))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let url = format!("{}/movies/feature.mp4", server.uri());
    let output_dir = temp.path().to_path_buf();

    let assert = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("offliner")
            .unwrap()
            .arg(&url)
            .arg("--output-dir")
            .arg(&output_dir)
            .args(["--quiet", "--no-progress", "--json"])
            .assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("\"status\""))
        .stdout(predicate::str::contains("downloaded"));

    let downloaded = temp.path().join("feature.mp4");
    assert_eq!(std::fs::read(&downloaded).unwrap(), b"feature film");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_download_still_exits_cleanly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movies/gone.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let url = format!("{}/movies/gone.mp4", server.uri());
    let output_dir = temp.path().to_path_buf();

    let assert = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("offliner")
            .unwrap()
            .arg(&url)
            .arg("--output-dir")
            .arg(&output_dir)
            .args(["--quiet", "--no-progress", "--json"])
            .assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("failed"));

    assert!(!temp.path().join("gone.mp4").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_run_skips_already_downloaded_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movies/feature.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"feature film".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let url = format!("{}/movies/feature.mp4", server.uri());

    for _ in 0..2 {
        let url = url.clone();
        let output_dir = temp.path().to_path_buf();
        tokio::task::spawn_blocking(move || {
            Command::cargo_bin("offliner")
                .unwrap()
                .arg(&url)
                .arg("--output-dir")
                .arg(&output_dir)
                .args(["--quiet", "--no-progress"])
                .assert()
                .success();
        })
        .await
        .unwrap();
    }

    // The .expect(1) on the mock verifies the second run never re-fetched.
    assert_eq!(
        std::fs::read(temp.path().join("feature.mp4")).unwrap(),
        b"feature film"
    );
}
