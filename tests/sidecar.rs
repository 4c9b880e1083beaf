//! Sidecar Gateway Integration Tests
//!
//! Runs the gateway against a scripted shell stand-in for the backend
//! process to verify the command/event round trip over stdin/stdout.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;
use tokio::time::timeout;

use ncmq::{ConvertOutcome, DiscoveredFile, Gateway, Item, SidecarGateway};

/// Write an executable fake backend script into the temp dir
fn fake_backend(temp: &TempDir, script: &str) -> PathBuf {
    let path = temp.path().join("fake-backend.sh");
    std::fs::write(&path, script).unwrap();

    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();

    path
}

fn item() -> Item {
    Item::from_discovery(DiscoveredFile {
        name: "song.ncm".to_string(),
        path: PathBuf::from("/music/song.ncm"),
        size: 4096,
    })
}

#[tokio::test]
async fn test_events_reach_subscribers() {
    let temp = TempDir::new().unwrap();
    let backend = fake_backend(
        &temp,
        concat!(
            "#!/bin/sh\n",
            "sleep 1\n",
            "printf '%s\\n' '{\"event\":\"app:file-detected\",\"name\":\"fresh.ncm\",\"path\":\"/music/fresh.ncm\",\"size\":7}'\n",
            "printf '%s\\n' '{\"event\":\"app:conversion-progress\",\"id\":\"abc\",\"progress\":40,\"status\":\"processing\"}'\n",
            "printf '%s\\n' 'this line is not JSON and must be ignored'\n",
            "printf '%s\\n' '{\"event\":\"app:conversion-progress\",\"id\":\"abc\",\"progress\":100,\"status\":\"completed\"}'\n",
            "cat > /dev/null\n",
        ),
    );

    let gateway = SidecarGateway::spawn(&backend).unwrap();
    let mut progress_rx = gateway.subscribe_progress();
    let mut discovery_rx = gateway.subscribe_discovery();

    let file = timeout(Duration::from_secs(5), discovery_rx.recv())
        .await
        .expect("no discovery event within 5s")
        .unwrap();
    assert_eq!(file.name, "fresh.ncm");
    assert_eq!(file.size, 7);

    let first = timeout(Duration::from_secs(5), progress_rx.recv())
        .await
        .expect("no progress event within 5s")
        .unwrap();
    assert_eq!(first.id, "abc");
    assert_eq!(first.progress, 40);

    // The junk line between the two events is dropped, not fatal
    let second = timeout(Duration::from_secs(5), progress_rx.recv())
        .await
        .expect("no second progress event within 5s")
        .unwrap();
    assert_eq!(second.progress, 100);
}

#[tokio::test]
async fn test_commands_round_trip_to_events() {
    let temp = TempDir::new().unwrap();
    // Replies to every command line with a fixed completed event
    let backend = fake_backend(
        &temp,
        concat!(
            "#!/bin/sh\n",
            "while IFS= read -r line; do\n",
            "  printf '%s\\n' '{\"event\":\"app:conversion-progress\",\"id\":\"echoed\",\"progress\":100,\"status\":\"completed\"}'\n",
            "done\n",
        ),
    );

    let gateway = SidecarGateway::spawn(&backend).unwrap();
    let mut progress_rx = gateway.subscribe_progress();

    let outcome = gateway.convert(&item()).await.unwrap();
    assert!(matches!(outcome, ConvertOutcome::Dispatched));

    let event = timeout(Duration::from_secs(5), progress_rx.recv())
        .await
        .expect("no reply event within 5s")
        .unwrap();
    assert_eq!(event.id, "echoed");
    assert_eq!(event.progress, 100);
}

#[tokio::test]
async fn test_watch_toggles_are_idempotent() {
    let temp = TempDir::new().unwrap();
    let backend = fake_backend(&temp, "#!/bin/sh\ncat > /dev/null\n");

    let gateway = SidecarGateway::spawn(&backend).unwrap();

    assert!(gateway.start_watch(Path::new("/music")).await.unwrap());
    assert!(!gateway.start_watch(Path::new("/music")).await.unwrap());

    assert!(gateway.stop_watch().await.unwrap());
    assert!(!gateway.stop_watch().await.unwrap());
}

#[tokio::test]
async fn test_spawn_failure_is_reported() {
    assert!(SidecarGateway::spawn(Path::new("/definitely/not/a/backend")).is_err());
}
