use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{RecordStore, sort_items};
use crate::error::StoreError;
use crate::state_machine::WorkItem;

/// On-disk layout of the store file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    items: Vec<WorkItem>,
}

/// Durable store kept as a single JSON document.
///
/// Every `save` rewrites the whole document into a sibling temp file and
/// renames it over the original, so readers see either the old or the new
/// document. Access from this process is serialized through `guard`.
pub struct JsonFileStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    fn io_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn read(&self) -> Result<StoreDocument, StoreError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StoreDocument::default()),
            Err(e) => return Err(self.io_err(e)),
        };
        if contents.trim().is_empty() {
            return Ok(StoreDocument::default());
        }
        serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn write(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(doc).map_err(|source| StoreError::Corrupt {
            path: self.path.display().to_string(),
            source,
        })?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| self.io_err(e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| self.io_err(e))
    }

    fn select(&self, pred: impl Fn(&WorkItem) -> bool) -> Result<Vec<WorkItem>, StoreError> {
        let _g = self.guard.lock().map_err(|_| StoreError::Poisoned)?;
        let mut items: Vec<WorkItem> = self.read()?.items.into_iter().filter(|i| pred(i)).collect();
        sort_items(&mut items);
        Ok(items)
    }
}

impl RecordStore for JsonFileStore {
    fn find_eligible_for_primary(&self) -> Result<Vec<WorkItem>, StoreError> {
        self.select(WorkItem::is_eligible_for_primary)
    }

    fn find_eligible_for_retry(&self) -> Result<Vec<WorkItem>, StoreError> {
        self.select(WorkItem::is_eligible_for_retry)
    }

    fn save(&self, item: &WorkItem) -> Result<(), StoreError> {
        let _g = self.guard.lock().map_err(|_| StoreError::Poisoned)?;
        let mut doc = self.read()?;
        match doc.items.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => doc.items.push(item.clone()),
        }
        self.write(&doc)?;
        debug!(item_id = %item.id, path = %self.path.display(), "saved work item");
        Ok(())
    }

    fn find_all(&self) -> Result<Vec<WorkItem>, StoreError> {
        self.select(|_| true)
    }
}
