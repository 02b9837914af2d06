use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use uuid::Uuid;

use super::{RecordStore, sort_items};
use crate::error::StoreError;
use crate::state_machine::WorkItem;

/// Non-durable store backed by a map.
#[derive(Default)]
pub struct InMemoryStore {
    items: Mutex<HashMap<Uuid, WorkItem>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: impl IntoIterator<Item = WorkItem>) -> Self {
        Self {
            items: Mutex::new(items.into_iter().map(|i| (i.id, i)).collect()),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<WorkItem> {
        self.lock().ok()?.get(&id).cloned()
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, WorkItem>>, StoreError> {
        self.items.lock().map_err(|_| StoreError::Poisoned)
    }

    fn select(&self, pred: impl Fn(&WorkItem) -> bool) -> Result<Vec<WorkItem>, StoreError> {
        let mut items: Vec<WorkItem> = self.lock()?.values().filter(|i| pred(*i)).cloned().collect();
        sort_items(&mut items);
        Ok(items)
    }
}

impl RecordStore for InMemoryStore {
    fn find_eligible_for_primary(&self) -> Result<Vec<WorkItem>, StoreError> {
        self.select(WorkItem::is_eligible_for_primary)
    }

    fn find_eligible_for_retry(&self) -> Result<Vec<WorkItem>, StoreError> {
        self.select(WorkItem::is_eligible_for_retry)
    }

    fn save(&self, item: &WorkItem) -> Result<(), StoreError> {
        self.lock()?.insert(item.id, item.clone());
        Ok(())
    }

    fn find_all(&self) -> Result<Vec<WorkItem>, StoreError> {
        self.select(|_| true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::UpdateAttachment;

    fn item(name: &str) -> WorkItem {
        WorkItem::new(
            format!("{name}.json"),
            Some(UpdateAttachment {
                name: name.into(),
                ..Default::default()
            }),
        )
    }

    #[test]
    fn handled_items_are_never_primary_eligible() {
        let mut done = item("done");
        done.handled = true;
        let open = item("open");
        let no_attachment = WorkItem::new("empty.json".into(), None);
        let store = InMemoryStore::with_items([done, open.clone(), no_attachment]);

        let eligible = store.find_eligible_for_primary().unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, open.id);
    }

    #[test]
    fn retry_query_selects_error_flag_only() {
        let mut failed = item("failed");
        failed.handled = true;
        failed.has_sending_error = true;
        let store = InMemoryStore::with_items([failed.clone(), item("open")]);

        let eligible = store.find_eligible_for_retry().unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, failed.id);
    }

    #[test]
    fn save_is_an_upsert() {
        let store = InMemoryStore::new();
        let mut it = item("x");
        store.save(&it).unwrap();
        it.handled = true;
        store.save(&it).unwrap();

        assert_eq!(store.find_all().unwrap().len(), 1);
        assert!(store.get(it.id).unwrap().handled);
    }
}
