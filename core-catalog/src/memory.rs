//! In-memory catalog store
//!
//! A [`CatalogStore`] backed by ordered maps behind a `tokio` read/write lock.
//! Used by tests and by embedders that rebuild their catalog on start-up. The
//! lock is never held across an await on anything but itself.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;
use tracing::trace;

use crate::error::{CatalogError, Result};
use crate::key::DatasetKey;
use crate::models::{now_millis, ConcurrencyTag, DatasetRecord, FolderRecord};
use crate::store::CatalogStore;

#[derive(Debug, Default)]
struct Entries {
    datasets: BTreeMap<DatasetKey, DatasetRecord>,
    folders: BTreeMap<DatasetKey, FolderRecord>,
}

impl Entries {
    fn ensure_ancestors(&mut self, key: &DatasetKey) {
        for ancestor in key.ancestors() {
            if self.folders.contains_key(&ancestor) {
                // every folder above an existing folder already exists
                break;
            }
            trace!(folder = %ancestor, "Creating implicit folder");
            self.folders
                .insert(ancestor.clone(), FolderRecord::new(ancestor));
        }
    }
}

/// Thread-safe in-memory catalog
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    entries: RwLock<Entries>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored datasets
    pub async fn dataset_count(&self) -> usize {
        self.entries.read().await.datasets.len()
    }

    /// Number of stored folders
    pub async fn folder_count(&self) -> usize {
        self.entries.read().await.folders.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn list_keys_under(&self, root: &DatasetKey) -> Result<HashSet<DatasetKey>> {
        let entries = self.entries.read().await;
        Ok(entries
            .datasets
            .keys()
            .filter(|key| key.is_descendant_of(root))
            .cloned()
            .collect())
    }

    async fn get_dataset(&self, key: &DatasetKey) -> Result<DatasetRecord> {
        let entries = self.entries.read().await;
        entries
            .datasets
            .get(key)
            .cloned()
            .ok_or_else(|| CatalogError::not_found("Dataset", key))
    }

    async fn add_or_update_dataset(&self, mut record: DatasetRecord) -> Result<DatasetRecord> {
        record
            .validate()
            .map_err(|message| CatalogError::InvalidInput {
                field: "DatasetRecord".to_string(),
                message,
            })?;

        let mut entries = self.entries.write().await;
        let key = record.key.clone();

        match (&record.tag, entries.datasets.get(&key)) {
            (None, Some(_)) => {
                return Err(CatalogError::concurrent_modification(
                    &key,
                    "dataset already exists",
                ));
            }
            (None, None) => {}
            (Some(_), None) => return Err(CatalogError::not_found("Dataset", &key)),
            (Some(presented), Some(stored)) => {
                if stored.tag.as_ref() != Some(presented) {
                    return Err(CatalogError::concurrent_modification(&key, "stale tag"));
                }
                record.created_at = stored.created_at;
            }
        }

        record.tag = Some(ConcurrencyTag::new());
        record.last_modified = now_millis();
        entries.ensure_ancestors(&key);
        entries.datasets.insert(key, record.clone());
        Ok(record)
    }

    async fn delete_dataset(&self, key: &DatasetKey, tag: &ConcurrencyTag) -> Result<()> {
        let mut entries = self.entries.write().await;
        let stored = entries
            .datasets
            .get(key)
            .ok_or_else(|| CatalogError::not_found("Dataset", key))?;

        if stored.tag.as_ref() != Some(tag) {
            return Err(CatalogError::concurrent_modification(key, "stale tag"));
        }

        entries.datasets.remove(key);
        Ok(())
    }

    async fn get_folder(&self, key: &DatasetKey) -> Result<FolderRecord> {
        let entries = self.entries.read().await;
        entries
            .folders
            .get(key)
            .cloned()
            .ok_or_else(|| CatalogError::not_found("Folder", key))
    }

    async fn delete_folder(&self, key: &DatasetKey, tag: &ConcurrencyTag) -> Result<()> {
        let mut entries = self.entries.write().await;
        let stored = entries
            .folders
            .get(key)
            .ok_or_else(|| CatalogError::not_found("Folder", key))?;

        if &stored.tag != tag {
            return Err(CatalogError::concurrent_modification(key, "stale tag"));
        }

        entries.folders.remove(key);
        entries
            .folders
            .retain(|candidate, _| !candidate.is_descendant_of(key));
        entries
            .datasets
            .retain(|candidate, _| !candidate.is_descendant_of(key));
        Ok(())
    }

    async fn list_folders_under(&self, root: &DatasetKey) -> Result<HashSet<DatasetKey>> {
        let entries = self.entries.read().await;
        Ok(entries
            .folders
            .keys()
            .filter(|key| key.is_descendant_of(root))
            .cloned()
            .collect())
    }
}
