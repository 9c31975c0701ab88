//! # Dataset Saver
//!
//! Turns a catalog record plus a connector handle into an extended record.
//!
//! The saver owns only the synchronization fields of a record: the schema and
//! the read definition. Everything else (owner, description, identity) is
//! carried through untouched, and the write is made with the tag the record
//! was read with, so a concurrent edit surfaces as
//! [`CatalogError::ConcurrentModification`](core_catalog::CatalogError).

use async_trait::async_trait;
use bridge_traits::{DatasetHandle, GetMetadataOptions, MetadataSource};
use chrono::Utc;
use core_catalog::{CatalogStore, DatasetRecord, ReadDefinition};
use core_runtime::config::SyncConfig;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::convert::schema_fields;
use crate::error::{Result, SyncError};

#[async_trait]
pub trait DatasetSaver: Send + Sync {
    /// Derive fresh metadata for `handle` and persist it onto `record`
    ///
    /// # Returns
    /// The stored record, carrying its new tag.
    ///
    /// # Errors
    /// A stale tag on `record` surfaces as a concurrent-modification error.
    async fn save(
        &self,
        record: DatasetRecord,
        handle: &DatasetHandle,
        source: &dyn MetadataSource,
    ) -> Result<DatasetRecord>;
}

/// Saver that writes straight to a [`CatalogStore`]
pub struct CatalogDatasetSaver {
    catalog: Arc<dyn CatalogStore>,
    max_leaf_columns: usize,
}

impl CatalogDatasetSaver {
    pub fn new(catalog: Arc<dyn CatalogStore>, max_leaf_columns: usize) -> Self {
        Self {
            catalog,
            max_leaf_columns,
        }
    }

    pub fn from_config(catalog: Arc<dyn CatalogStore>, config: &SyncConfig) -> Self {
        Self::new(catalog, config.policy.max_metadata_leaf_columns)
    }
}

#[async_trait]
impl DatasetSaver for CatalogDatasetSaver {
    #[instrument(skip_all, fields(key = %record.key))]
    async fn save(
        &self,
        mut record: DatasetRecord,
        handle: &DatasetHandle,
        source: &dyn MetadataSource,
    ) -> Result<DatasetRecord> {
        let options = GetMetadataOptions {
            max_leaf_columns: self.max_leaf_columns,
        };
        let metadata = source.get_dataset_metadata(handle, &options).await?;

        let leaf_columns = metadata.leaf_column_count();
        if leaf_columns > self.max_leaf_columns {
            return Err(SyncError::TooManyLeafColumns {
                key: record.key.to_string(),
                limit: self.max_leaf_columns,
                actual: leaf_columns,
            });
        }

        let read_signature = match source.as_read_signature() {
            Some(signer) => Some(signer.provide_signature(handle, &metadata).await?.to_vec()),
            None => None,
        };

        record.schema = schema_fields(&metadata.schema);
        record.read_definition = Some(ReadDefinition {
            read_signature,
            record_count: metadata.record_count,
            partition_columns: metadata.partition_columns,
            extra_info: metadata.extra_info.map(|extra| extra.to_vec()),
            last_refresh_date: Utc::now().timestamp_millis(),
        });

        debug!(leaf_columns, "Saving extended metadata");
        Ok(self.catalog.add_or_update_dataset(record).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{
        BridgeError, DatasetMetadata, EntityPath, Field, GetDatasetOptions,
    };
    use core_catalog::{DatasetKey, InMemoryCatalogStore};
    use mockall::mock;

    mock! {
        Source {}

        #[async_trait]
        impl MetadataSource for Source {
            async fn get_dataset_handle(
                &self,
                path: &EntityPath,
                options: &GetDatasetOptions,
            ) -> BridgeResult<Option<DatasetHandle>>;
            async fn get_dataset_metadata(
                &self,
                handle: &DatasetHandle,
                options: &GetMetadataOptions,
            ) -> BridgeResult<DatasetMetadata>;
        }
    }

    fn handle() -> DatasetHandle {
        DatasetHandle::new("h-1", EntityPath::from_components(["src", "db", "t"]))
    }

    async fn stored_shallow(catalog: &InMemoryCatalogStore) -> DatasetRecord {
        let key = DatasetKey::parse("src.db.t").unwrap();
        catalog
            .add_or_update_dataset(
                DatasetRecord::shallow(key, "h-1").with_description("curated by hand"),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_save_extends_record_and_keeps_user_fields() {
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let record = stored_shallow(&catalog).await;
        let old_tag = record.tag.clone();

        let mut source = MockSource::new();
        source
            .expect_get_dataset_metadata()
            .times(1)
            .returning(|_, options| {
                assert_eq!(options.max_leaf_columns, 10);
                Ok(DatasetMetadata::new(vec![Field::new("id", "bigint"), Field::new("v", "string")])
                    .with_record_count(42)
                    .with_partition_columns(vec!["dt".to_string()]))
            });

        let saver = CatalogDatasetSaver::new(catalog.clone(), 10);
        let saved = saver.save(record, &handle(), &source).await.unwrap();

        assert!(saved.is_extended());
        assert_ne!(saved.tag, old_tag);
        assert_eq!(saved.leaf_column_count(), 2);
        assert_eq!(saved.description.as_deref(), Some("curated by hand"));

        let definition = saved.read_definition.as_ref().unwrap();
        assert_eq!(definition.record_count, Some(42));
        assert_eq!(definition.partition_columns, vec!["dt".to_string()]);
        // the mock has no signature capability
        assert!(definition.read_signature.is_none());
        assert!(definition.last_refresh_date > 0);
    }

    #[tokio::test]
    async fn test_save_rejects_wide_schema() {
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let record = stored_shallow(&catalog).await;

        let mut source = MockSource::new();
        source.expect_get_dataset_metadata().returning(|_, _| {
            Ok(DatasetMetadata::new(
                (0..3).map(|i| Field::new(format!("c{}", i), "int")).collect(),
            ))
        });

        let saver = CatalogDatasetSaver::new(catalog.clone(), 2);
        let err = saver.save(record, &handle(), &source).await.unwrap_err();

        assert!(matches!(
            err,
            SyncError::TooManyLeafColumns {
                limit: 2,
                actual: 3,
                ..
            }
        ));
        let stored = catalog
            .get_dataset(&DatasetKey::parse("src.db.t").unwrap())
            .await
            .unwrap();
        assert!(!stored.is_extended());
    }

    #[tokio::test]
    async fn test_save_with_stale_tag_is_concurrent_modification() {
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let record = stored_shallow(&catalog).await;

        // someone else updates the record first
        catalog
            .add_or_update_dataset(record.clone().with_owner("alice"))
            .await
            .unwrap();

        let mut source = MockSource::new();
        source
            .expect_get_dataset_metadata()
            .returning(|_, _| Ok(DatasetMetadata::new(vec![Field::new("id", "bigint")])));

        let saver = CatalogDatasetSaver::new(catalog.clone(), 10);
        let err = saver.save(record, &handle(), &source).await.unwrap_err();
        assert!(err.is_concurrent_modification());
    }

    #[tokio::test]
    async fn test_save_propagates_vanished_dataset() {
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let record = stored_shallow(&catalog).await;

        let mut source = MockSource::new();
        source
            .expect_get_dataset_metadata()
            .returning(|handle, _| Err(BridgeError::DatasetNotFound(handle.id.clone())));

        let saver = CatalogDatasetSaver::new(catalog, 10);
        let err = saver.save(record, &handle(), &source).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
