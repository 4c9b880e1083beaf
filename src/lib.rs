//! ncmq - Conversion queue manager for NCM-encrypted audio files
//!
//! Coordinates batch conversion of NetEase `.ncm` files by an external
//! backend process that is reachable only through an asynchronous
//! command/event boundary. The queue core tracks each file's lifecycle,
//! keeps a single conversion in flight, reconciles inbound progress
//! events, and supports a continuous watch mode that admits newly
//! discovered files into the same queue.
//!
//! # Modules
//!
//! - `domain`: item lifecycle and progress-event payloads
//! - `gateway`: the backend boundary (sidecar process or local simulation)
//! - `queue`: event reconciliation and the dispatch state machine
//! - `controller`: outward control surface and derived statistics
//! - `discover`: one-shot folder scans feeding the queue
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Convert a folder once
//! ncmq run ~/Music/ncm
//!
//! # Keep converting as new files appear
//! ncmq watch ~/Music/ncm
//! ```

pub mod cli;
pub mod config;
pub mod controller;
pub mod discover;
pub mod domain;
pub mod gateway;
pub mod queue;

// Re-export main types at crate root for convenience
pub use controller::{RunController, RunStats};
pub use domain::{DiscoveredFile, Item, ItemStatus, ProgressEvent, ProgressStatus};
pub use gateway::{ConvertOutcome, Gateway, GatewayError, SidecarGateway, SimulatedGateway};
pub use queue::{reconcile, QueueManager};
