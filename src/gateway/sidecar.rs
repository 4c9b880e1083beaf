//! Sidecar gateway: drives the real conversion backend.
//!
//! The backend runs as a long-lived child process. Commands go to its
//! stdin as one JSON object per line; progress and discovery events come
//! back on stdout in the same framing. Decryption, transcoding, output
//! placement, and the actual folder watcher all live on the backend side
//! of this boundary.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use crate::domain::{DiscoveredFile, Item, ProgressEvent};

use super::{ConvertOutcome, Gateway, GatewayError};

const PROGRESS_CHANNEL_CAPACITY: usize = 256;
const DISCOVERY_CHANNEL_CAPACITY: usize = 64;

/// Commands written to the backend's stdin
#[derive(Debug, Serialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum BackendCommand {
    ConvertNcmFile {
        id: String,
        #[serde(rename = "filePath")]
        file_path: String,
    },
    StartFolderWatcher {
        path: String,
    },
    StopFolderWatcher,
}

/// Events read from the backend's stdout
#[derive(Debug, Deserialize)]
#[serde(tag = "event")]
enum BackendEvent {
    #[serde(rename = "app:conversion-progress")]
    ConversionProgress(ProgressEvent),

    #[serde(rename = "app:file-detected")]
    FileDetected(DiscoveredFile),
}

/// Gateway over a spawned backend process
pub struct SidecarGateway {
    commands: mpsc::Sender<String>,
    progress_tx: broadcast::Sender<ProgressEvent>,
    discovery_tx: broadcast::Sender<DiscoveredFile>,
    watching: AtomicBool,
}

impl SidecarGateway {
    /// Spawn the backend binary and wire up the command/event channels
    pub fn spawn(binary: &Path) -> Result<Self, GatewayError> {
        let mut child = Command::new(binary)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GatewayError::Unreachable("backend stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GatewayError::Unreachable("backend stdout unavailable".to_string()))?;
        let stderr = child.stderr.take();

        let (commands, mut command_rx) = mpsc::channel::<String>(64);

        // Writer: forward command lines to the backend. Exits when the
        // gateway is dropped or the backend closes its stdin.
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(line) = command_rx.recv().await {
                if stdin
                    .write_all(format!("{}\n", line).as_bytes())
                    .await
                    .is_err()
                {
                    warn!("backend stdin closed, dropping command channel");
                    break;
                }
            }
        });

        let (progress_tx, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        let (discovery_tx, _) = broadcast::channel(DISCOVERY_CHANNEL_CAPACITY);

        // Reader: decode event lines from the backend and fan them out
        let progress = progress_tx.clone();
        let discovery = discovery_tx.clone();
        tokio::spawn(async move {
            let mut child = child;
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match serde_json::from_str::<BackendEvent>(&line) {
                    Ok(BackendEvent::ConversionProgress(event)) => {
                        let _ = progress.send(event);
                    }
                    Ok(BackendEvent::FileDetected(file)) => {
                        let _ = discovery.send(file);
                    }
                    Err(e) => debug!(%line, error = %e, "ignoring unparseable backend line"),
                }
            }
            match child.wait().await {
                Ok(status) if status.success() => debug!("backend exited cleanly"),
                Ok(status) => warn!(%status, "backend exited"),
                Err(e) => warn!(error = %e, "failed to reap backend"),
            }
        });

        if let Some(stderr) = stderr {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!("backend: {}", line);
                }
            });
        }

        Ok(Self {
            commands,
            progress_tx,
            discovery_tx,
            watching: AtomicBool::new(false),
        })
    }

    async fn send(&self, command: &BackendCommand) -> Result<(), GatewayError> {
        let line = serde_json::to_string(command)?;
        self.commands
            .send(line)
            .await
            .map_err(|_| GatewayError::Unreachable("backend process is gone".to_string()))
    }
}

#[async_trait]
impl Gateway for SidecarGateway {
    fn name(&self) -> &str {
        "sidecar"
    }

    async fn convert(&self, item: &Item) -> Result<ConvertOutcome, GatewayError> {
        self.send(&BackendCommand::ConvertNcmFile {
            id: item.id.clone(),
            file_path: item.path.to_string_lossy().into_owned(),
        })
        .await?;

        Ok(ConvertOutcome::Dispatched)
    }

    fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent> {
        self.progress_tx.subscribe()
    }

    fn subscribe_discovery(&self) -> broadcast::Receiver<DiscoveredFile> {
        self.discovery_tx.subscribe()
    }

    async fn start_watch(&self, path: &Path) -> Result<bool, GatewayError> {
        if self.watching.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }

        let command = BackendCommand::StartFolderWatcher {
            path: path.to_string_lossy().into_owned(),
        };
        if let Err(e) = self.send(&command).await {
            self.watching.store(false, Ordering::SeqCst);
            return Err(e);
        }

        Ok(true)
    }

    async fn stop_watch(&self) -> Result<bool, GatewayError> {
        if !self.watching.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }

        self.send(&BackendCommand::StopFolderWatcher).await?;
        Ok(true)
    }
}
