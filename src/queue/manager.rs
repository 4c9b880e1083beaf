//! The conversion queue state machine.
//!
//! Owns the item collection and the dispatch loop. Exactly one item is
//! in flight at a time, and the loop re-evaluates after every mutation
//! rather than on a timer, so behavior is deterministic under any event
//! order.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{DiscoveredFile, Item, ItemStatus, ProgressEvent};
use crate::gateway::{ConvertOutcome, Gateway};

use super::reconciler::reconcile;

/// Queue state machine around an injected gateway
pub struct QueueManager {
    gateway: Arc<dyn Gateway>,
    items: Vec<Item>,
    processing: bool,
    watching: bool,
}

impl QueueManager {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            items: Vec::new(),
            processing: false,
            watching: false,
        }
    }

    /// Snapshot of the collection, in discovery order
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn is_watching(&self) -> bool {
        self.watching
    }

    /// Append one discovered file as a Pending item; returns its id
    pub fn enqueue(&mut self, file: DiscoveredFile) -> String {
        let item = Item::from_discovery(file);
        let id = item.id.clone();
        debug!(id = %id, name = %item.name, "queued");
        self.items.push(item);
        id
    }

    /// Append a batch of discovered files
    pub fn enqueue_batch(&mut self, files: Vec<DiscoveredFile>) {
        for file in files {
            self.enqueue(file);
        }
    }

    /// Replace the whole collection (source folder changed)
    pub fn reset(&mut self, files: Vec<DiscoveredFile>) {
        self.items.clear();
        self.enqueue_batch(files);
    }

    /// Begin batch processing.
    ///
    /// Requires a non-empty collection; calling while already processing
    /// is a no-op. Returns whether the queue is processing afterwards.
    pub async fn start(&mut self) -> bool {
        if self.items.is_empty() {
            warn!("refusing to start batch: queue is empty");
            return false;
        }

        if !self.processing {
            self.processing = true;
            info!(total = self.items.len(), "batch started");
        }
        self.pump().await;

        self.processing
    }

    /// Stop dispatching new items. The in-flight conversion, if any,
    /// runs to completion. Idempotent.
    pub fn stop(&mut self) {
        if self.processing {
            info!("batch stopped");
        }
        self.processing = false;
    }

    /// Flip continuous-discovery mode. Enabling watch always processes;
    /// disabling it lets the current queue drain and then go idle.
    pub async fn set_watching(&mut self, watching: bool) {
        self.watching = watching;
        if watching {
            self.processing = true;
        }
        self.pump().await;
    }

    /// Apply one inbound progress event.
    ///
    /// Events carrying an id that is not in the collection are dropped
    /// without touching any item.
    pub async fn apply(&mut self, event: ProgressEvent) {
        let Some(index) = self.items.iter().position(|item| item.id == event.id) else {
            debug!(id = %event.id, "dropping event for unknown item");
            return;
        };

        self.items[index] = reconcile(&self.items[index], &event);
        self.pump().await;
    }

    /// The dispatch loop. Level-triggered: re-run after every mutation.
    ///
    /// Pushes at most one item into flight. Immediate outcomes are
    /// applied inline and the loop continues until it blocks on an
    /// in-flight conversion, runs dry, or stops processing. A rejected
    /// dispatch fails that item and moves on; it never aborts the run.
    pub async fn pump(&mut self) {
        loop {
            if !self.processing {
                return;
            }

            if self
                .items
                .iter()
                .any(|item| item.status == ItemStatus::Converting)
            {
                return;
            }

            let Some(index) = self
                .items
                .iter()
                .position(|item| item.status == ItemStatus::Pending)
            else {
                if !self.watching && !self.items.is_empty() {
                    self.processing = false;
                    info!("queue drained");
                }
                return;
            };

            let item = self.items[index].clone().converting();
            self.items[index] = item.clone();
            debug!(id = %item.id, name = %item.name, "dispatching");

            let outcome = self.gateway.convert(&item).await;
            match outcome {
                Ok(ConvertOutcome::Dispatched) => return,
                Ok(ConvertOutcome::Immediate(Ok(()))) => {
                    self.items[index] = self.items[index].clone().completed();
                }
                Ok(ConvertOutcome::Immediate(Err(message))) => {
                    warn!(id = %item.id, %message, "conversion failed");
                    self.items[index] = self.items[index].clone().failed(message);
                }
                Err(e) => {
                    warn!(id = %item.id, error = %e, "dispatch rejected");
                    self.items[index] = self.items[index].clone().failed(e.to_string());
                }
            }
        }
    }
}
