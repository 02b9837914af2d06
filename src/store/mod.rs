//! Persisted queue of work items.
//!
//! The orchestrator only reads through the two eligibility queries and
//! writes through `save`, one item at a time. Nothing here deletes items.

mod file;
#[cfg(test)]
mod memory;

pub use file::JsonFileStore;
#[cfg(test)]
pub use memory::InMemoryStore;

use crate::error::StoreError;
use crate::state_machine::WorkItem;

pub trait RecordStore: Send + Sync {
    /// Items with `handled == false` and an attachment.
    fn find_eligible_for_primary(&self) -> Result<Vec<WorkItem>, StoreError>;

    /// Items with `has_sending_error == true`.
    fn find_eligible_for_retry(&self) -> Result<Vec<WorkItem>, StoreError>;

    /// Upsert by id.
    fn save(&self, item: &WorkItem) -> Result<(), StoreError>;

    fn find_all(&self) -> Result<Vec<WorkItem>, StoreError>;
}

/// Stable order for query results: oldest first, ties broken by id.
fn sort_items(items: &mut [WorkItem]) {
    items.sort_by(|a, b| a.received_at.cmp(&b.received_at).then(a.id.cmp(&b.id)));
}
