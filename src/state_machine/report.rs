use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::{ItemState, Workflow};

/// Structured record produced at the end of each workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub workflow: Workflow,
    /// Items returned by the store query.
    pub selected: usize,
    /// Items left untouched by the date filter.
    pub filtered_out: usize,
    pub sent: usize,
    pub conversion_failed: usize,
    pub delivery_failed: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl RunReport {
    pub fn start(workflow: Workflow, started_at: DateTime<Utc>) -> Self {
        Self {
            workflow,
            selected: 0,
            filtered_out: 0,
            sent: 0,
            conversion_failed: 0,
            delivery_failed: 0,
            started_at,
            completed_at: started_at,
            duration_ms: 0,
        }
    }

    /// Count one committed item.
    pub fn record(&mut self, outcome: ItemState) {
        match outcome {
            ItemState::Pending => {}
            ItemState::Sent => self.sent += 1,
            ItemState::ConversionFailed => self.conversion_failed += 1,
            ItemState::DeliveryFailed => self.delivery_failed += 1,
        }
    }

    pub fn finish(mut self, completed_at: DateTime<Utc>) -> Self {
        self.completed_at = completed_at;
        self.duration_ms = (completed_at - self.started_at).num_milliseconds();
        self
    }

    /// Number of items whose state was committed in this run.
    pub fn committed(&self) -> usize {
        self.sent + self.conversion_failed + self.delivery_failed
    }
}
