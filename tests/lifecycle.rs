//! Queue Lifecycle Integration Tests
//!
//! End-to-end scenarios over the run controller with gateway doubles:
//! batch drain, failure surfacing, watch mode, and the single-in-flight
//! dispatch policy.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use ncmq::{
    ConvertOutcome, DiscoveredFile, Gateway, GatewayError, Item, ItemStatus, ProgressEvent,
    RunController,
};

/// Scripted gateway double: resolves conversions inline or records
/// dispatches for the test to complete via events
struct ScriptedGateway {
    inline: Option<Result<(), String>>,
    dispatched: Mutex<Vec<String>>,
    progress_tx: broadcast::Sender<ProgressEvent>,
    discovery_tx: broadcast::Sender<DiscoveredFile>,
}

impl ScriptedGateway {
    fn immediate(result: Result<(), String>) -> Self {
        Self {
            inline: Some(result),
            dispatched: Mutex::new(Vec::new()),
            progress_tx: broadcast::channel(16).0,
            discovery_tx: broadcast::channel(16).0,
        }
    }

    fn asynchronous() -> Self {
        Self {
            inline: None,
            dispatched: Mutex::new(Vec::new()),
            progress_tx: broadcast::channel(16).0,
            discovery_tx: broadcast::channel(16).0,
        }
    }

    fn dispatched(&self) -> Vec<String> {
        self.dispatched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gateway for ScriptedGateway {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn convert(&self, item: &Item) -> Result<ConvertOutcome, GatewayError> {
        self.dispatched.lock().unwrap().push(item.id.clone());
        match &self.inline {
            Some(result) => Ok(ConvertOutcome::Immediate(result.clone())),
            None => Ok(ConvertOutcome::Dispatched),
        }
    }

    fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress_tx.subscribe()
    }

    fn subscribe_discovery(&self) -> broadcast::Receiver<DiscoveredFile> {
        self.discovery_tx.subscribe()
    }

    async fn start_watch(&self, _path: &Path) -> Result<bool, GatewayError> {
        Ok(true)
    }

    async fn stop_watch(&self) -> Result<bool, GatewayError> {
        Ok(true)
    }
}

fn files(count: usize) -> Vec<DiscoveredFile> {
    (0..count)
        .map(|i| DiscoveredFile {
            name: format!("song-{}.ncm", i),
            path: PathBuf::from(format!("/music/song-{}.ncm", i)),
            size: 1024,
        })
        .collect()
}

#[tokio::test]
async fn test_batch_of_three_completes() {
    let mut controller = RunController::new(Arc::new(ScriptedGateway::immediate(Ok(()))));

    controller.set_folder(files(3));
    controller.start_batch().await;

    assert!(!controller.is_processing());
    for item in controller.items() {
        assert_eq!(item.status, ItemStatus::Completed);
        assert_eq!(item.progress, 100);
        assert!(item.error.is_none());
    }

    let stats = controller.stats();
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_failing_batch_surfaces_exact_message() {
    let gateway = ScriptedGateway::immediate(Err("Invalid NCM Key or corrupt header".to_string()));
    let mut controller = RunController::new(Arc::new(gateway));

    controller.set_folder(files(1));
    controller.start_batch().await;

    assert!(!controller.is_processing());
    assert_eq!(controller.items()[0].status, ItemStatus::Failed);
    assert_eq!(
        controller.items()[0].error.as_deref(),
        Some("Invalid NCM Key or corrupt header")
    );
}

#[tokio::test]
async fn test_at_most_one_item_converting() {
    let gateway = Arc::new(ScriptedGateway::asynchronous());
    let mut controller = RunController::new(gateway.clone());

    controller.set_folder(files(5));
    controller.start_batch().await;

    // Drive the whole batch through completion events, checking the
    // in-flight bound at every observable instant
    for expected_done in 1..=5 {
        let converting: Vec<&Item> = controller
            .items()
            .iter()
            .filter(|item| item.status == ItemStatus::Converting)
            .collect();
        assert_eq!(converting.len(), 1);

        let id = converting[0].id.clone();
        controller.on_progress(ProgressEvent::tick(&id, 50)).await;
        assert_eq!(
            controller
                .items()
                .iter()
                .filter(|item| item.status == ItemStatus::Converting)
                .count(),
            1
        );

        controller.on_progress(ProgressEvent::completed(&id)).await;
        assert_eq!(
            controller
                .items()
                .iter()
                .filter(|item| item.status == ItemStatus::Completed)
                .count(),
            expected_done
        );
    }

    assert!(!controller.is_processing());
    assert_eq!(gateway.dispatched().len(), 5);
}

#[tokio::test]
async fn test_async_error_event_fails_item_and_continues() {
    let gateway = Arc::new(ScriptedGateway::asynchronous());
    let mut controller = RunController::new(gateway.clone());

    controller.set_folder(files(2));
    controller.start_batch().await;

    let first = controller.items()[0].id.clone();
    controller
        .on_progress(ProgressEvent::error(&first, "FFmpeg conversion failed"))
        .await;

    // The failure is local: the second item is dispatched regardless
    assert_eq!(controller.items()[0].status, ItemStatus::Failed);
    assert_eq!(controller.items()[1].status, ItemStatus::Converting);

    let second = controller.items()[1].id.clone();
    controller.on_progress(ProgressEvent::completed(&second)).await;

    assert!(!controller.is_processing());
    let stats = controller.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 1);
}

#[tokio::test]
async fn test_watch_mode_admits_late_discoveries() {
    let mut controller = RunController::new(Arc::new(ScriptedGateway::immediate(Ok(()))));

    controller.set_folder(files(2));
    controller.toggle_watch(Path::new("/music")).await.unwrap();

    // Both initial items drained, but the run does not self-terminate
    assert!(controller.is_processing());
    assert_eq!(controller.stats().completed, 2);

    // A third file appears later; no start_batch call is needed
    controller
        .on_discovery(DiscoveredFile {
            name: "late.ncm".to_string(),
            path: PathBuf::from("/music/late.ncm"),
            size: 99,
        })
        .await;

    assert!(controller.is_processing());
    assert_eq!(controller.stats().completed, 3);
}

#[tokio::test]
async fn test_stop_batch_is_idempotent() {
    let mut controller = RunController::new(Arc::new(ScriptedGateway::asynchronous()));

    controller.set_folder(files(1));
    controller.start_batch().await;

    controller.stop_batch();
    assert!(!controller.is_processing());

    controller.stop_batch();
    assert!(!controller.is_processing());
}

#[tokio::test]
async fn test_unknown_event_is_discarded() {
    let mut controller = RunController::new(Arc::new(ScriptedGateway::asynchronous()));

    controller.set_folder(files(2));
    controller.start_batch().await;

    let before: Vec<Item> = controller.items().to_vec();
    controller
        .on_progress(ProgressEvent::completed("never-queued"))
        .await;

    assert_eq!(controller.items(), &before[..]);
}
