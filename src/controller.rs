//! Outward-facing control surface over the queue.
//!
//! The controller owns the queue manager and a handle to the gateway,
//! exposes the user-level operations (start/stop batch, watch toggle,
//! folder change) and derives aggregate statistics on demand. Counts
//! are never stored, so they cannot drift from the collection.

use std::path::Path;
use std::sync::Arc;

use crate::domain::{DiscoveredFile, Item, ItemStatus, ProgressEvent};
use crate::gateway::{Gateway, GatewayError};
use crate::queue::QueueManager;

/// Aggregate queue statistics, recomputed from the live collection on
/// every call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub total: usize,
    pub pending: usize,
    pub converting: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Control surface for one conversion run
pub struct RunController {
    gateway: Arc<dyn Gateway>,
    queue: QueueManager,
}

impl RunController {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            queue: QueueManager::new(gateway.clone()),
            gateway,
        }
    }

    pub fn items(&self) -> &[Item] {
        self.queue.items()
    }

    pub fn is_processing(&self) -> bool {
        self.queue.is_processing()
    }

    pub fn is_watching(&self) -> bool {
        self.queue.is_watching()
    }

    /// Load a freshly selected folder, discarding any previous queue
    pub fn set_folder(&mut self, files: Vec<DiscoveredFile>) {
        self.queue.reset(files);
    }

    /// Begin batch processing; no-op when empty or already processing
    pub async fn start_batch(&mut self) -> bool {
        self.queue.start().await
    }

    /// Stop dispatching. In-flight work is not cancelled. Idempotent.
    pub fn stop_batch(&mut self) {
        self.queue.stop();
    }

    /// Toggle continuous watch mode; returns the new watching state.
    ///
    /// Enabling watch also begins processing, since continuous mode
    /// always processes.
    pub async fn toggle_watch(&mut self, path: &Path) -> Result<bool, GatewayError> {
        if self.queue.is_watching() {
            self.gateway.stop_watch().await?;
            self.queue.set_watching(false).await;
            Ok(false)
        } else {
            self.gateway.start_watch(path).await?;
            self.queue.set_watching(true).await;
            Ok(true)
        }
    }

    /// Admit one file discovered while watching
    pub async fn on_discovery(&mut self, file: DiscoveredFile) {
        self.queue.enqueue(file);
        self.queue.pump().await;
    }

    /// Apply one inbound progress event
    pub async fn on_progress(&mut self, event: ProgressEvent) {
        self.queue.apply(event).await;
    }

    /// Recompute aggregate statistics from the collection
    pub fn stats(&self) -> RunStats {
        let mut stats = RunStats::default();

        for item in self.queue.items() {
            stats.total += 1;
            match item.status {
                ItemStatus::Idle | ItemStatus::Pending => stats.pending += 1,
                ItemStatus::Converting => stats.converting += 1,
                ItemStatus::Completed => stats.completed += 1,
                ItemStatus::Failed => stats.failed += 1,
            }
        }

        stats
    }
}
