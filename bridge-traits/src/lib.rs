//! # Connector Bridge Traits
//!
//! The contract between the catalog synchronization core and the connectors
//! that expose external data sources (Hive metastores, object stores, file
//! systems) as dataset handles.
//!
//! ## Overview
//!
//! The core never knows how a connector crawls its source. It only consumes:
//!
//! - [`MetadataSource`](source::MetadataSource) - resolve paths to handles and
//!   derive extended metadata
//! - [`SupportsListingDatasets`](source::SupportsListingDatasets) - optional
//!   native enumeration of every dataset
//! - [`SupportsReadSignature`](source::SupportsReadSignature) - optional cheap
//!   staleness check for stored metadata
//! - [`DatasetHandleListing`](listing::DatasetHandleListing) - a lazy, closable
//!   sequence of handles
//!
//! ## Error Handling
//!
//! All connector operations return [`BridgeError`](error::BridgeError).
//! Implementations should report a dataset that vanished mid-operation as
//! `BridgeError::DatasetNotFound`; the core treats it as a benign race rather
//! than a failure.
//!
//! ## Thread Safety
//!
//! Sources require `Send + Sync` so one instance can serve a synchronization
//! pass and query planning at the same time. Listings only require `Send`:
//! they are owned by a single pass.

pub mod error;
pub mod listing;
pub mod metadata;
pub mod source;

pub use error::BridgeError;

// Re-export commonly used types
pub use listing::{
    DatasetHandleListing, EmptyDatasetHandleListing, StreamDatasetHandleListing,
    VecDatasetHandleListing,
};
pub use metadata::{
    DatasetHandle, DatasetMetadata, EntityPath, Field, GetDatasetOptions, GetMetadataOptions,
    MetadataValidity,
};
pub use source::{MetadataSource, SupportsListingDatasets, SupportsReadSignature};
