//! Catalog store contract
//!
//! The CRUD surface the synchronization engine consumes. Datasets and folders
//! are addressed by [`DatasetKey`]; every write is guarded by the record's
//! [`ConcurrencyTag`].
//!
//! ## Failure Modes
//!
//! | Operation | `NotFound` | `ConcurrentModification` |
//! |-----------|------------|--------------------------|
//! | `get_dataset` / `get_folder` | absent | - |
//! | `add_or_update_dataset` (create) | - | key already exists |
//! | `add_or_update_dataset` (update) | absent | stale tag |
//! | `delete_dataset` / `delete_folder` | absent | stale tag |
//!
//! Implementations must be safe for concurrent use by several synchronizers
//! and external mutators.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::Result;
use crate::key::DatasetKey;
use crate::models::{ConcurrencyTag, DatasetRecord, FolderRecord};

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Every dataset key strictly beneath `root`
    async fn list_keys_under(&self, root: &DatasetKey) -> Result<HashSet<DatasetKey>>;

    /// Fetch a dataset record
    ///
    /// # Errors
    /// `NotFound` when no dataset is stored at `key`.
    async fn get_dataset(&self, key: &DatasetKey) -> Result<DatasetRecord>;

    /// Create or update a dataset record
    ///
    /// A record without a tag is created; a record carrying a tag updates the
    /// stored record only if the tag is current. Missing ancestor folders
    /// (below the root) are created in the same write.
    ///
    /// # Returns
    /// The stored record with its new tag.
    async fn add_or_update_dataset(&self, record: DatasetRecord) -> Result<DatasetRecord>;

    /// Delete a dataset if `tag` is current
    async fn delete_dataset(&self, key: &DatasetKey, tag: &ConcurrencyTag) -> Result<()>;

    /// Fetch a folder record
    async fn get_folder(&self, key: &DatasetKey) -> Result<FolderRecord>;

    /// Delete a folder and everything beneath it if `tag` is current
    async fn delete_folder(&self, key: &DatasetKey, tag: &ConcurrencyTag) -> Result<()>;

    /// Every folder key strictly beneath `root`
    async fn list_folders_under(&self, root: &DatasetKey) -> Result<HashSet<DatasetKey>>;
}
