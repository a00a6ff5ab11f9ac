//! Tests for polling status documents written by another process

use std::thread;
use std::time::Duration;

use fixture_core::{Error, FileStatusSource, PollPolicy, StatusSource, is_ready, wait_until_ready};
use tempfile::TempDir;

const NOT_READY: &str = r#"{
  "kind": "GitRepository",
  "status": {"conditions": [{"type": "Ready", "status": "False", "reason": "Progressing", "message": "cloning"}]}
}"#;

const READY: &str = r#"{
  "kind": "GitRepository",
  "status": {"conditions": [{"type": "Ready", "status": "True", "reason": "Succeeded", "message": "stored artifact"}]}
}"#;

fn policy(timeout_ms: u64) -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(20),
        timeout: Duration::from_millis(timeout_ms),
    }
}

#[test]
fn test_waits_for_file_to_turn_ready() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gitrepository.json");
    std::fs::write(&path, NOT_READY).unwrap();

    let writer = {
        let path = path.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            std::fs::write(path, READY).unwrap();
        })
    };

    let object = wait_until_ready(&FileStatusSource::new(&path), policy(5_000)).unwrap();
    writer.join().unwrap();

    assert!(is_ready(&object.conditions));
    assert_eq!(object.kind.as_deref(), Some("GitRepository"));
}

#[test]
fn test_missing_file_counts_as_not_ready() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kustomization.json");

    let writer = {
        let path = path.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(100));
            std::fs::write(path, READY).unwrap();
        })
    };

    assert!(wait_until_ready(&FileStatusSource::new(&path), policy(5_000)).is_ok());
    writer.join().unwrap();
}

#[test]
fn test_gives_up_with_last_message() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("gitrepository.json");
    std::fs::write(&path, NOT_READY).unwrap();
    let source = FileStatusSource::new(&path);

    let err = wait_until_ready(&source, policy(150)).unwrap_err();

    match err {
        Error::NotReady { last_message, .. } => assert!(last_message.contains("cloning"), "{last_message}"),
        other => panic!("expected NotReady, got {other:?}"),
    }
    assert!(source.describe().ends_with("gitrepository.json"));
}
