//! Ingestion of inbound update files into the record store.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::state_machine::{UpdateAttachment, WorkItem};
use crate::store::RecordStore;

/// Populates the record store from an inbound source.
pub trait Ingestor: Send + Sync {
    /// Returns the number of new work items created.
    fn ingest(&self) -> impl Future<Output = Result<usize, RelayError>> + Send;
}

/// Picks up `*.json` update files dropped into an inbox directory.
///
/// Each file becomes one work item. Files that do not parse still produce an
/// item, but without an attachment, so they are recorded and never sent.
/// Consumed files are moved to `processed/` inside the inbox.
pub struct InboxIngestor<S> {
    inbox: PathBuf,
    store: Arc<S>,
}

impl<S: RecordStore> InboxIngestor<S> {
    pub fn new(inbox: impl Into<PathBuf>, store: Arc<S>) -> Self {
        Self {
            inbox: inbox.into(),
            store,
        }
    }

    fn processed_dir(&self) -> PathBuf {
        self.inbox.join("processed")
    }

    fn pending_files(&self) -> Result<Vec<PathBuf>, RelayError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.inbox)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();
        Ok(files)
    }

    fn archive(&self, file: &Path, name: &str) -> Result<(), RelayError> {
        let processed = self.processed_dir();
        std::fs::create_dir_all(&processed)?;
        std::fs::rename(file, processed.join(name))?;
        Ok(())
    }

    fn ingest_files(&self) -> Result<usize, RelayError> {
        if !self.inbox.is_dir() {
            debug!(inbox = %self.inbox.display(), "inbox does not exist, nothing to ingest");
            return Ok(0);
        }

        let known: HashSet<String> = self.store.find_all()?.into_iter().map(|i| i.source).collect();
        let mut created = 0;

        for file in self.pending_files()? {
            let Some(name) = file.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
                continue;
            };
            if known.contains(&name) {
                debug!(file = %name, "already ingested, archiving");
                self.archive(&file, &name)?;
                continue;
            }

            let attachment = parse_attachment(&file);
            let item = WorkItem::new(name.clone(), attachment);
            self.store.save(&item)?;
            self.archive(&file, &name)?;
            created += 1;
            debug!(item_id = %item.id, file = %name, eligible = item.is_eligible_for_primary(), "ingested update file");
        }

        Ok(created)
    }
}

impl<S: RecordStore> Ingestor for InboxIngestor<S> {
    async fn ingest(&self) -> Result<usize, RelayError> {
        let created = self.ingest_files()?;
        if created > 0 {
            info!(created, inbox = %self.inbox.display(), "received new update files");
        }
        Ok(created)
    }
}

fn parse_attachment(file: &Path) -> Option<UpdateAttachment> {
    let parsed = std::fs::read_to_string(file)
        .map_err(|e| e.to_string())
        .and_then(|c| serde_json::from_str::<UpdateAttachment>(&c).map_err(|e| e.to_string()));
    match parsed {
        Ok(mut attachment) => {
            if attachment.name.trim().is_empty() {
                attachment.name = file
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default()
                    .to_string();
            }
            Some(attachment)
        }
        Err(e) => {
            warn!(file = %file.display(), error = %e, "update file has no usable attachment");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[tokio::test]
    async fn ingests_json_files_and_archives_them() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", r#"{"name": "update-03-01-2024.xlsx", "well_no": "MN-1"}"#);
        write(dir.path(), "notes.txt", "ignored");
        let store = Arc::new(InMemoryStore::new());
        let ingestor = InboxIngestor::new(dir.path(), store.clone());

        assert_eq!(ingestor.ingest().await.unwrap(), 1);

        let items = store.find_eligible_for_primary().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "a.json");
        assert_eq!(items[0].attachment_name(), "update-03-01-2024.xlsx");
        assert!(dir.path().join("processed/a.json").exists());
        assert!(!dir.path().join("a.json").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn unparseable_file_becomes_item_without_attachment() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "broken.json", "{ nope");
        let store = Arc::new(InMemoryStore::new());

        InboxIngestor::new(dir.path(), store.clone()).ingest().await.unwrap();

        let all = store.find_all().unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].attachment.is_none());
        assert!(store.find_eligible_for_primary().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_name_defaults_to_file_stem() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "rig12-03-01-2024.json", r#"{"well_no": "MN-1"}"#);
        let store = Arc::new(InMemoryStore::new());

        InboxIngestor::new(dir.path(), store.clone()).ingest().await.unwrap();

        assert_eq!(store.find_all().unwrap()[0].attachment_name(), "rig12-03-01-2024");
    }

    #[tokio::test]
    async fn already_ingested_source_is_not_duplicated() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", r#"{"well_no": "MN-1"}"#);
        let store = Arc::new(InMemoryStore::with_items([WorkItem::new("a.json".into(), None)]));

        let created = InboxIngestor::new(dir.path(), store.clone()).ingest().await.unwrap();

        assert_eq!(created, 0);
        assert_eq!(store.find_all().unwrap().len(), 1);
        assert!(dir.path().join("processed/a.json").exists());
    }

    #[tokio::test]
    async fn missing_inbox_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(InMemoryStore::new());
        let ingestor = InboxIngestor::new(dir.path().join("absent"), store);
        assert_eq!(ingestor.ingest().await.unwrap(), 0);
    }
}
