//! # Catalog Synchronization
//!
//! Keeps the catalog's view of an external source in step with the source.
//!
//! ## Overview
//!
//! A [`Synchronizer`] reconciles one source root per pass: it admits datasets
//! that appeared upstream, refreshes the ones whose metadata went stale and
//! removes the ones (and their folders) that disappeared.
//!
//! ## Components
//!
//! - **Synchronizer** (`synchronizer`): the three-phase reconciliation pass
//! - **Dataset Saver** (`saver`): derives and writes extended metadata
//! - **Ancestry Tracker** (`ancestry`): decides which folders survive cleanup
//! - **Listings** (`listing`): scoped connector listings and the catalog-driven fallback
//! - **Status** (`status`): pass outcome and per-dataset failures

pub mod ancestry;
pub mod convert;
pub mod error;
pub mod listing;
pub mod saver;
pub mod status;
pub mod synchronizer;

pub use ancestry::AncestryTracker;
pub use error::{Result, SyncError};
pub use listing::{NamespaceListing, ScopedListing};
pub use saver::{CatalogDatasetSaver, DatasetSaver};
pub use status::{FailureEntry, SyncOutcome};
pub use synchronizer::Synchronizer;
