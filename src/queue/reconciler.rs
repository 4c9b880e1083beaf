//! Reconciliation of inbound progress events onto item state.
//!
//! A pure reducer: given the current item and one event, produce the
//! updated item. Collection-level concerns (unknown ids, re-running the
//! dispatch loop) live in the queue manager.

use crate::domain::{Item, ItemStatus, ProgressEvent, ProgressStatus};

/// Fallback when the backend reports an error without a message
const UNSPECIFIED_ERROR: &str = "conversion failed";

/// Apply one progress event to one item, returning the updated item.
///
/// Events are applied whatever the current status: they may race the
/// Converting transition, and a late terminal event must still land.
pub fn reconcile(item: &Item, event: &ProgressEvent) -> Item {
    match event.status {
        Some(ProgressStatus::Completed) => item.clone().completed(),
        Some(ProgressStatus::Error) => item.clone().failed(
            event
                .message
                .clone()
                .unwrap_or_else(|| UNSPECIFIED_ERROR.to_string()),
        ),
        Some(ProgressStatus::Processing) | None => Item {
            progress: clamped_progress(item, event.progress),
            ..item.clone()
        },
    }
}

/// Progress never exceeds 100 and never regresses while an item is
/// Converting; out-of-order ticks are clamped rather than trusted
fn clamped_progress(item: &Item, reported: u8) -> u8 {
    let capped = reported.min(100);
    if item.status == ItemStatus::Converting {
        capped.max(item.progress)
    } else {
        capped
    }
}
