//! Scoped dataset listings
//!
//! [`ScopedListing`] owns a connector listing for the duration of one pass and
//! closes it when dropped, so the listing is released on completion, on
//! cancellation and on error alike.
//!
//! Sources without native listing get a [`NamespaceListing`]: the catalog's
//! own view of the source, re-resolved key by key through the connector.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, DatasetHandle, DatasetHandleListing, GetDatasetOptions, MetadataSource,
};
use core_catalog::DatasetKey;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace};

use crate::convert::entity_path;
use crate::error::Result;

/// A listing that is closed when it goes out of scope
pub struct ScopedListing {
    inner: Box<dyn DatasetHandleListing>,
}

impl ScopedListing {
    pub fn new(inner: Box<dyn DatasetHandleListing>) -> Self {
        Self { inner }
    }

    /// Open the best listing the source offers for `root`
    ///
    /// `existing` is the catalog snapshot, used only when the source cannot
    /// list natively.
    pub async fn open(
        source: &Arc<dyn MetadataSource>,
        root: &DatasetKey,
        existing: &HashSet<DatasetKey>,
        options: &GetDatasetOptions,
    ) -> Result<Self> {
        let inner = match source.as_listing() {
            Some(listing) => {
                debug!("Using native dataset listing");
                listing
                    .list_dataset_handles(&entity_path(root), options)
                    .await?
            }
            None => {
                debug!(
                    known = existing.len(),
                    "Source cannot list datasets; listing from catalog"
                );
                Box::new(NamespaceListing::new(
                    Arc::clone(source),
                    existing.iter().cloned(),
                    options.clone(),
                ))
            }
        };
        Ok(Self::new(inner))
    }

    pub async fn next_handle(&mut self) -> BridgeResult<Option<DatasetHandle>> {
        self.inner.next_handle().await
    }
}

impl Drop for ScopedListing {
    fn drop(&mut self) {
        self.inner.close();
    }
}

/// Fallback listing driven by the keys the catalog already holds.
///
/// Each key is resolved through [`MetadataSource::get_dataset_handle`]; keys
/// the source no longer resolves are skipped, which leaves them unmatched.
pub struct NamespaceListing {
    source: Arc<dyn MetadataSource>,
    pending: VecDeque<DatasetKey>,
    options: GetDatasetOptions,
}

impl NamespaceListing {
    pub fn new(
        source: Arc<dyn MetadataSource>,
        keys: impl IntoIterator<Item = DatasetKey>,
        options: GetDatasetOptions,
    ) -> Self {
        let mut keys: Vec<_> = keys.into_iter().collect();
        keys.sort();
        Self {
            source,
            pending: keys.into(),
            options,
        }
    }
}

#[async_trait]
impl DatasetHandleListing for NamespaceListing {
    async fn next_handle(&mut self) -> BridgeResult<Option<DatasetHandle>> {
        while let Some(key) = self.pending.pop_front() {
            match self
                .source
                .get_dataset_handle(&entity_path(&key), &self.options)
                .await
            {
                Ok(Some(handle)) => return Ok(Some(handle)),
                Ok(None) | Err(BridgeError::DatasetNotFound(_)) => {
                    trace!(key = %key, "Dataset no longer resolves in source");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    fn close(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{
        DatasetMetadata, EntityPath, GetMetadataOptions, SupportsListingDatasets,
    };
    use std::sync::atomic::{AtomicBool, Ordering};

    fn key(path: &str) -> DatasetKey {
        DatasetKey::parse(path).unwrap()
    }

    /// Resolves every path except those named "gone"
    struct CatalogOnlySource;

    #[async_trait]
    impl MetadataSource for CatalogOnlySource {
        async fn get_dataset_handle(
            &self,
            path: &EntityPath,
            _options: &GetDatasetOptions,
        ) -> BridgeResult<Option<DatasetHandle>> {
            Ok((path.name() != Some("gone"))
                .then(|| DatasetHandle::new(path.to_string(), path.clone())))
        }

        async fn get_dataset_metadata(
            &self,
            _handle: &DatasetHandle,
            _options: &GetMetadataOptions,
        ) -> BridgeResult<DatasetMetadata> {
            Ok(DatasetMetadata::default())
        }
    }

    struct ClosingListing {
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl DatasetHandleListing for ClosingListing {
        async fn next_handle(&mut self) -> BridgeResult<Option<DatasetHandle>> {
            Err(BridgeError::OperationFailed("cursor expired".to_string()))
        }

        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct ListingSource {
        closed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl MetadataSource for ListingSource {
        async fn get_dataset_handle(
            &self,
            _path: &EntityPath,
            _options: &GetDatasetOptions,
        ) -> BridgeResult<Option<DatasetHandle>> {
            Ok(None)
        }

        async fn get_dataset_metadata(
            &self,
            _handle: &DatasetHandle,
            _options: &GetMetadataOptions,
        ) -> BridgeResult<DatasetMetadata> {
            Ok(DatasetMetadata::default())
        }

        fn as_listing(&self) -> Option<&dyn SupportsListingDatasets> {
            Some(self)
        }
    }

    #[async_trait]
    impl SupportsListingDatasets for ListingSource {
        async fn list_dataset_handles(
            &self,
            _root: &EntityPath,
            _options: &GetDatasetOptions,
        ) -> BridgeResult<Box<dyn DatasetHandleListing>> {
            Ok(Box::new(ClosingListing {
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    #[tokio::test]
    async fn test_namespace_listing_skips_unresolved_keys() {
        let source: Arc<dyn MetadataSource> = Arc::new(CatalogOnlySource);
        let existing = HashSet::from([key("src.b"), key("src.gone"), key("src.a")]);

        let mut listing = ScopedListing::open(
            &source,
            &key("src"),
            &existing,
            &GetDatasetOptions::default(),
        )
        .await
        .unwrap();

        let mut seen = Vec::new();
        while let Some(handle) = listing.next_handle().await.unwrap() {
            seen.push(handle.id);
        }
        assert_eq!(seen, vec!["src.a", "src.b"]);
    }

    #[tokio::test]
    async fn test_scoped_listing_closes_on_error_path() {
        let closed = Arc::new(AtomicBool::new(false));
        let source: Arc<dyn MetadataSource> = Arc::new(ListingSource {
            closed: Arc::clone(&closed),
        });

        let outcome: Result<()> = async {
            let mut listing = ScopedListing::open(
                &source,
                &key("src"),
                &HashSet::new(),
                &GetDatasetOptions::default(),
            )
            .await?;
            listing.next_handle().await?;
            Ok(())
        }
        .await;

        assert!(outcome.is_err());
        assert!(closed.load(Ordering::SeqCst));
    }
}
