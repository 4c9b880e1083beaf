//! Local simulation of the conversion backend.
//!
//! Used for development and UI testing when no backend binary is
//! configured. Conversions resolve inline after a fixed delay, with a
//! small deterministic per-id failure rate. The progress channel carries
//! no events; the watch toggles run a local folder watcher so watch mode
//! can be exercised end to end without a backend.

use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use async_trait::async_trait;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use sha2::{Digest, Sha256};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{info, warn};

use crate::discover::{discovered_file, matches_extension};
use crate::domain::{DiscoveredFile, Item, ProgressEvent};

use super::{ConvertOutcome, Gateway, GatewayError};

/// Error string reported for simulated conversion failures
pub const SIMULATED_FAILURE: &str = "Invalid NCM Key or corrupt header";

const DISCOVERY_CHANNEL_CAPACITY: usize = 64;
const DEBOUNCE: Duration = Duration::from_millis(500);

/// Roughly one in ten simulated conversions fails, decided by the item
/// id so a given item always resolves the same way
pub(crate) fn failure_roll(id: &str) -> bool {
    let digest = Sha256::digest(id.as_bytes());
    digest[0] < 26
}

/// Stand-in for the whole backend: delay, deterministic outcomes, and a
/// local watcher behind the same watch toggles
pub struct SimulatedGateway {
    delay: Duration,
    extensions: Vec<String>,
    progress_tx: broadcast::Sender<ProgressEvent>,
    discovery_tx: broadcast::Sender<DiscoveredFile>,
    watcher: Mutex<Option<WatchTask>>,
}

impl SimulatedGateway {
    /// Create a simulation with the given per-item latency and admitted
    /// file extensions
    pub fn new(delay: Duration, extensions: Vec<String>) -> Self {
        let (progress_tx, _) = broadcast::channel(1);
        let (discovery_tx, _) = broadcast::channel(DISCOVERY_CHANNEL_CAPACITY);

        Self {
            delay,
            extensions,
            progress_tx,
            discovery_tx,
            watcher: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Gateway for SimulatedGateway {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn convert(&self, item: &Item) -> Result<ConvertOutcome, GatewayError> {
        tokio::time::sleep(self.delay).await;

        if failure_roll(&item.id) {
            Ok(ConvertOutcome::Immediate(Err(SIMULATED_FAILURE.to_string())))
        } else {
            Ok(ConvertOutcome::Immediate(Ok(())))
        }
    }

    /// No events are ever emitted here; outcomes resolve inline in
    /// `convert` instead
    fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress_tx.subscribe()
    }

    fn subscribe_discovery(&self) -> broadcast::Receiver<DiscoveredFile> {
        self.discovery_tx.subscribe()
    }

    async fn start_watch(&self, path: &Path) -> Result<bool, GatewayError> {
        let mut guard = self.watcher.lock().await;
        if guard.is_some() {
            return Ok(false);
        }

        *guard = Some(WatchTask::spawn(
            path.to_path_buf(),
            self.extensions.clone(),
            self.discovery_tx.clone(),
        ));

        Ok(true)
    }

    async fn stop_watch(&self) -> Result<bool, GatewayError> {
        let mut guard = self.watcher.lock().await;
        match guard.take() {
            Some(watch) => {
                watch.stop().await;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Handle to the local watcher task
struct WatchTask {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl WatchTask {
    fn spawn(
        path: PathBuf,
        extensions: Vec<String>,
        discovery_tx: broadcast::Sender<DiscoveredFile>,
    ) -> Self {
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            if let Err(e) = run_watcher(path, extensions, discovery_tx, &mut stop_rx).await {
                warn!(error = %e, "folder watcher stopped");
            }
        });

        Self { stop_tx, task }
    }

    async fn stop(self) {
        let _ = self.stop_tx.send(()).await;
        let _ = self.task.await;
    }
}

/// Internal watcher loop: debounced filesystem notifications filtered to
/// the admitted extensions, each path announced at most once
async fn run_watcher(
    path: PathBuf,
    extensions: Vec<String>,
    discovery_tx: broadcast::Sender<DiscoveredFile>,
    stop_rx: &mut mpsc::Receiver<()>,
) -> anyhow::Result<()> {
    let mut announced: Vec<PathBuf> = Vec::new();

    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(DEBOUNCE, tx)?;
    debouncer.watcher().watch(&path, RecursiveMode::NonRecursive)?;

    info!("watching {} for encrypted audio files", path.display());

    loop {
        if stop_rx.try_recv().is_ok() {
            info!("folder watcher stopping");
            break;
        }

        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(Ok(events)) => {
                for event in events {
                    let file_path = event.path;

                    if !matches_extension(&file_path, &extensions) {
                        continue;
                    }
                    if announced.contains(&file_path) {
                        continue;
                    }

                    let metadata = match std::fs::metadata(&file_path) {
                        Ok(m) => m,
                        Err(_) => continue,
                    };
                    if !metadata.is_file() {
                        continue;
                    }

                    announced.push(file_path.clone());
                    let _ = discovery_tx.send(discovered_file(&file_path, metadata.len()));
                }
            }
            Ok(Err(e)) => {
                warn!(error = ?e, "watch error");
            }
            Err(RecvTimeoutError::Timeout) => {
                // Expected - loop back for the stop signal
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("watcher channel disconnected");
                break;
            }
        }
    }

    Ok(())
}
