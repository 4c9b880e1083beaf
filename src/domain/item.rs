//! Queue item model.
//!
//! One [`Item`] tracks the conversion lifecycle of a single discovered
//! encrypted file. Transitions replace the item wholesale rather than
//! mutating fields in place, so a concurrent reader never observes a
//! half-updated record.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A file announced by the folder scan or the backend watcher.
///
/// Carries only what discovery knows: display name, the path handed to
/// the backend, and the on-disk size. Extension filtering happens at the
/// discovery boundary; the queue trusts its input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredFile {
    /// File name only
    pub name: String,

    /// Full path to the encrypted file
    pub path: PathBuf,

    /// File size in bytes
    pub size: u64,
}

/// Conversion lifecycle status of one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Pre-discovery placeholder; never observed once an item is in the
    /// collection (items are created directly as Pending)
    Idle,

    /// Waiting for dispatch
    Pending,

    /// Handed to the backend, conversion in flight
    Converting,

    /// Conversion finished successfully (terminal)
    Completed,

    /// Conversion failed (terminal, no automatic retry)
    Failed,
}

impl ItemStatus {
    /// Terminal states are never re-entered by the dispatch loop
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Converting => "converting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// One unit of work: a single discovered encrypted file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Opaque unique identifier; the join key for all asynchronous events
    pub id: String,

    /// File name only
    pub name: String,

    /// Full path to the encrypted file
    pub path: PathBuf,

    /// File size in bytes
    pub size: u64,

    /// When the file entered the queue
    pub discovered_at: DateTime<Utc>,

    /// Current lifecycle status
    pub status: ItemStatus,

    /// Percent complete in [0, 100]; meaningful only while Converting
    pub progress: u8,

    /// Error message; present only when Failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Item {
    /// Create a Pending item from a discovered file
    pub fn from_discovery(file: DiscoveredFile) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: file.name,
            path: file.path,
            size: file.size,
            discovered_at: Utc::now(),
            status: ItemStatus::Pending,
            progress: 0,
            error: None,
        }
    }

    /// The Converting form of this item; progress restarts at zero
    pub fn converting(self) -> Self {
        Self {
            status: ItemStatus::Converting,
            progress: 0,
            error: None,
            ..self
        }
    }

    /// The Completed form; progress is forced to 100 and any stale error
    /// is cleared
    pub fn completed(self) -> Self {
        Self {
            status: ItemStatus::Completed,
            progress: 100,
            error: None,
            ..self
        }
    }

    /// The Failed form; progress keeps its last observed value
    pub fn failed(self, message: impl Into<String>) -> Self {
        Self {
            status: ItemStatus::Failed,
            error: Some(message.into()),
            ..self
        }
    }
}
