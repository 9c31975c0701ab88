//! # Catalog Module
//!
//! Owns the metadata catalog the synchronization engine reconciles against.
//!
//! ## Overview
//!
//! This module provides:
//! - [`DatasetKey`]: hierarchical keys shared by datasets and folders
//! - [`DatasetRecord`] / [`FolderRecord`]: persisted entities with optimistic
//!   concurrency tags
//! - [`CatalogStore`]: the CRUD contract, with an in-memory implementation and
//!   (behind the `sqlite` feature) a persistent one over `sqlx`

pub mod error;
pub mod key;
pub mod memory;
pub mod models;
pub mod store;

#[cfg(feature = "sqlite")]
pub mod db;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use error::{CatalogError, Result};
pub use key::{Ancestors, DatasetKey};
pub use memory::InMemoryCatalogStore;
pub use models::{ConcurrencyTag, DatasetRecord, FolderRecord, ReadDefinition, SchemaField};
pub use store::CatalogStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCatalogStore;
