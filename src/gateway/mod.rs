//! Gateway to the conversion backend.
//!
//! The queue core talks to the backend exclusively through the
//! [`Gateway`] trait: one command to request a conversion, broadcast
//! channels for inbound progress and discovery events, and a pair of
//! idempotent watch toggles. Two variants exist, a sidecar process
//! speaking line-delimited JSON and a local simulation, and the queue
//! manager cannot tell them apart.

pub mod sidecar;
pub mod simulated;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;

use crate::config::ResolvedConfig;
use crate::domain::{DiscoveredFile, Item, ProgressEvent};

// Re-export the gateway variants
pub use sidecar::SidecarGateway;
pub use simulated::SimulatedGateway;

/// Errors raised by the dispatch path itself.
///
/// Anything that goes wrong after a dispatch was accepted arrives as an
/// error event on the progress channel instead.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("failed to start backend: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("could not encode backend command: {0}")]
    Encode(#[from] serde_json::Error),
}

/// How a conversion request resolved at the dispatch boundary
#[derive(Debug, Clone)]
pub enum ConvertOutcome {
    /// The gateway completed the conversion inline and already knows the
    /// terminal result (local simulation)
    Immediate(Result<(), String>),

    /// The backend accepted the dispatch; the terminal result arrives
    /// later on the progress channel
    Dispatched,
}

/// Command/event boundary to the conversion backend
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Variant label for logs
    fn name(&self) -> &str;

    /// Request conversion of one item.
    ///
    /// Acceptance is not completion: a [`ConvertOutcome::Dispatched`]
    /// outcome only means the backend took the command; the conversion
    /// may still fail later on the event channel.
    async fn convert(&self, item: &Item) -> Result<ConvertOutcome, GatewayError>;

    /// Subscribe to inbound progress events.
    ///
    /// Dropping the receiver is the deregistration. The run loop
    /// subscribes exactly once per process.
    fn subscribe_progress(&self) -> broadcast::Receiver<ProgressEvent>;

    /// Subscribe to file-detected notifications emitted while watching
    fn subscribe_discovery(&self) -> broadcast::Receiver<DiscoveredFile>;

    /// Ask the backend to start watching a directory for new files.
    ///
    /// Returns false when a watch was already running; never errors for
    /// that reason.
    async fn start_watch(&self, path: &Path) -> Result<bool, GatewayError>;

    /// Ask the backend to stop watching. Idempotent like `start_watch`.
    async fn stop_watch(&self) -> Result<bool, GatewayError>;
}

/// Pick the gateway variant for this process.
///
/// Runs once at startup; the choice is fixed for the process lifetime.
/// A configured backend binary selects the sidecar, anything else falls
/// back to the local simulation. Callers hand the result to
/// [`QueueManager::new`](crate::queue::QueueManager::new).
pub fn detect(config: &ResolvedConfig) -> Result<Arc<dyn Gateway>, GatewayError> {
    match &config.backend_binary {
        Some(binary) => {
            info!(backend = %binary.display(), "using sidecar backend");
            Ok(Arc::new(SidecarGateway::spawn(binary)?))
        }
        None => {
            info!("no backend configured, using local simulation");
            Ok(Arc::new(SimulatedGateway::new(
                config.simulate_delay,
                config.extensions.clone(),
            )))
        }
    }
}
