//! Metadata Source Contract
//!
//! A metadata source is the connector side of catalog synchronization. Every
//! source can resolve a dataset path to a handle and derive extended metadata
//! for a handle. Sources may additionally support:
//!
//! - [`SupportsListingDatasets`]: enumerate every dataset natively
//! - [`SupportsReadSignature`]: summarize the physical state metadata was
//!   derived from, so staleness can be checked without re-deriving it
//!
//! Capabilities are discovered through [`MetadataSource::as_listing`] and
//! [`MetadataSource::as_read_signature`]. Callers query them once per pass
//! rather than at every call site.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;
use crate::listing::DatasetHandleListing;
use crate::metadata::{
    DatasetHandle, DatasetMetadata, EntityPath, GetDatasetOptions, GetMetadataOptions,
    MetadataValidity,
};

/// Connector exposing tables/files as dataset handles
///
/// # Example
///
/// ```ignore
/// use bridge_traits::source::MetadataSource;
///
/// async fn describe(source: &dyn MetadataSource, path: &EntityPath) -> Result<()> {
///     if let Some(handle) = source.get_dataset_handle(path, &Default::default()).await? {
///         let metadata = source
///             .get_dataset_metadata(&handle, &Default::default())
///             .await?;
///         println!("{} has {} columns", path, metadata.leaf_column_count());
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Resolve a dataset path to a handle
    ///
    /// # Returns
    /// - `Ok(Some(handle))` if the source still has the dataset
    /// - `Ok(None)` if it does not
    async fn get_dataset_handle(
        &self,
        path: &EntityPath,
        options: &GetDatasetOptions,
    ) -> Result<Option<DatasetHandle>>;

    /// Derive extended metadata for a handle
    ///
    /// # Errors
    /// Returns [`BridgeError::DatasetNotFound`](crate::error::BridgeError::DatasetNotFound)
    /// if the dataset vanished after the handle was produced.
    async fn get_dataset_metadata(
        &self,
        handle: &DatasetHandle,
        options: &GetMetadataOptions,
    ) -> Result<DatasetMetadata>;

    /// Native listing capability, if the source has one
    fn as_listing(&self) -> Option<&dyn SupportsListingDatasets> {
        None
    }

    /// Read signature capability, if the source has one
    fn as_read_signature(&self) -> Option<&dyn SupportsReadSignature> {
        None
    }
}

/// Sources that can enumerate their datasets without help from the catalog.
#[async_trait]
pub trait SupportsListingDatasets: Send + Sync {
    /// Open a listing of every dataset under `root`
    ///
    /// The returned listing must be closed by the caller.
    async fn list_dataset_handles(
        &self,
        root: &EntityPath,
        options: &GetDatasetOptions,
    ) -> Result<Box<dyn DatasetHandleListing>>;
}

/// Sources that can cheaply tell whether stored metadata is stale.
#[async_trait]
pub trait SupportsReadSignature: Send + Sync {
    /// Produce the read signature for freshly derived metadata
    async fn provide_signature(
        &self,
        handle: &DatasetHandle,
        metadata: &DatasetMetadata,
    ) -> Result<Bytes>;

    /// Compare a stored signature against the dataset's current state
    ///
    /// `signature` is `None` when the stored metadata carries no signature;
    /// implementations should answer [`MetadataValidity::Invalid`] then.
    async fn validate_metadata(
        &self,
        signature: Option<&[u8]>,
        handle: &DatasetHandle,
        current: &DatasetMetadata,
    ) -> Result<MetadataValidity>;
}
