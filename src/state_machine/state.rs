use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::WorkItem;

/// The two delivery workflows that commit work item state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Workflow {
    Primary,
    Retry,
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Workflow::Primary => write!(f, "primary"),
            Workflow::Retry => write!(f, "retry"),
        }
    }
}

/// Per-run state of a work item.
///
/// Every item selected for a run starts in `Pending` and ends in one of the
/// three outcome states: PENDING → SENT | CONVERSION_FAILED | DELIVERY_FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemState {
    Pending,
    Sent,
    ConversionFailed,
    DeliveryFailed,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemState::Pending => write!(f, "PENDING"),
            ItemState::Sent => write!(f, "SENT"),
            ItemState::ConversionFailed => write!(f, "CONVERSION_FAILED"),
            ItemState::DeliveryFailed => write!(f, "DELIVERY_FAILED"),
        }
    }
}

/// Maps a run outcome onto the persisted flags of a work item.
pub struct StateMachine;

impl StateMachine {
    /// Apply the commit rule for `outcome` under `workflow` to `item`.
    ///
    /// - `Sent` marks the item handled, clears the error flag and stamps
    ///   `sending_time`, in both workflows.
    /// - `ConversionFailed` in the primary workflow marks the item handled and
    ///   retry-eligible. In the retry workflow it clears the error flag so the
    ///   item stops being retried; `handled` is left as stored.
    /// - `DeliveryFailed` marks the item handled and retry-eligible in both
    ///   workflows. The primary queue never sees it again; only the retry
    ///   workflow does.
    /// - `Pending` leaves the item untouched.
    ///
    /// Returns `false` when nothing was changed.
    pub fn commit(
        item: &mut WorkItem,
        workflow: Workflow,
        outcome: ItemState,
        now: DateTime<Utc>,
    ) -> bool {
        match (workflow, outcome) {
            (_, ItemState::Pending) => return false,
            (_, ItemState::Sent) => {
                item.handled = true;
                item.has_sending_error = false;
                item.sending_time = Some(now);
            }
            (Workflow::Primary, ItemState::ConversionFailed) => {
                item.handled = true;
                item.has_sending_error = true;
            }
            (Workflow::Retry, ItemState::ConversionFailed) => {
                item.has_sending_error = false;
            }
            (_, ItemState::DeliveryFailed) => {
                item.handled = true;
                item.has_sending_error = true;
            }
        }
        true
    }
}
