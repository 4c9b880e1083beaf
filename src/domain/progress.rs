//! Inbound progress events.
//!
//! The payload shape of the backend's `app:conversion-progress` event.
//! Events are keyed by item id; no ordering is assumed between dispatch
//! acknowledgment and the first event for an item.

use serde::{Deserialize, Serialize};

/// Marker carried by a progress event: a terminal transition or a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    /// Conversion is underway
    Processing,

    /// Conversion finished successfully
    Completed,

    /// Conversion failed; `message` carries the detail
    Error,
}

/// Payload of one `app:conversion-progress` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Item id the event refers to
    pub id: String,

    /// Percent complete in [0, 100]
    pub progress: u8,

    /// Present on state changes; absent on pure ticks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProgressStatus>,

    /// Error detail; only meaningful with an error status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressEvent {
    /// A pure progress tick
    pub fn tick(id: impl Into<String>, progress: u8) -> Self {
        Self {
            id: id.into(),
            progress,
            status: None,
            message: None,
        }
    }

    /// A terminal success event
    pub fn completed(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            progress: 100,
            status: Some(ProgressStatus::Completed),
            message: None,
        }
    }

    /// A terminal failure event
    pub fn error(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            progress: 0,
            status: Some(ProgressStatus::Error),
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_round_trip() {
        let event = ProgressEvent::error("abc", "Invalid NCM file format");

        let json = serde_json::to_string(&event).unwrap();
        let parsed: ProgressEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, event);
        assert_eq!(parsed.status, Some(ProgressStatus::Error));
    }

    #[test]
    fn test_tick_omits_optional_fields() {
        let json = serde_json::to_string(&ProgressEvent::tick("abc", 42)).unwrap();

        assert!(!json.contains("status"));
        assert!(!json.contains("message"));
    }

    #[test]
    fn test_status_wire_names() {
        let event: ProgressEvent =
            serde_json::from_str(r#"{"id":"a","progress":100,"status":"completed"}"#).unwrap();

        assert_eq!(event.status, Some(ProgressStatus::Completed));
    }
}
