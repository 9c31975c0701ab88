//! Catalog domain models
//!
//! Records persisted by a [`CatalogStore`](crate::store::CatalogStore). A
//! dataset record starts *shallow* (key and source handle only) when a new
//! dataset is first seen, and becomes *extended* once schema and read
//! definition have been derived from the source.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::key::DatasetKey;

// =============================================================================
// Concurrency Tags
// =============================================================================

/// Opaque version token for optimistic concurrency.
///
/// Every successful write produces a new tag. Updates and deletes must present
/// the tag they read; a stale tag is rejected as a concurrent modification.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConcurrencyTag(String);

impl ConcurrencyTag {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConcurrencyTag {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConcurrencyTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Datasets
// =============================================================================

/// A column in a stored dataset schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SchemaField>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            children: Vec::new(),
        }
    }

    pub fn leaf_count(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(SchemaField::leaf_count).sum()
        }
    }
}

/// How to read a dataset, as last derived from its source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadDefinition {
    /// Connector summary of the physical state this definition was derived from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_signature: Option<Vec<u8>>,
    pub record_count: Option<u64>,
    #[serde(default)]
    pub partition_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_info: Option<Vec<u8>>,
    /// Milliseconds since the epoch
    pub last_refresh_date: i64,
}

/// Catalog entry for one dataset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Unique identifier
    pub id: String,
    pub key: DatasetKey,
    /// Connector handle id the record was created from
    pub source_handle: Option<String>,
    /// `None` until the record has been persisted
    pub tag: Option<ConcurrencyTag>,
    pub owner: Option<String>,
    pub description: Option<String>,
    /// Empty for shallow records
    pub schema: Vec<SchemaField>,
    /// `None` for shallow records
    pub read_definition: Option<ReadDefinition>,
    /// Milliseconds since the epoch
    pub created_at: i64,
    pub last_modified: i64,
}

impl DatasetRecord {
    /// Create a shallow record for a dataset just discovered in a source
    pub fn shallow(key: DatasetKey, source_handle: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            key,
            source_handle: Some(source_handle.into()),
            tag: None,
            owner: None,
            description: None,
            schema: Vec::new(),
            read_definition: None,
            created_at: now,
            last_modified: now,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// True once a read definition has been recorded
    pub fn is_extended(&self) -> bool {
        self.read_definition.is_some()
    }

    /// Stored read signature, if the record is extended and has one
    pub fn read_signature(&self) -> Option<&[u8]> {
        self.read_definition
            .as_ref()
            .and_then(|definition| definition.read_signature.as_deref())
    }

    pub fn leaf_column_count(&self) -> usize {
        self.schema.iter().map(SchemaField::leaf_count).sum()
    }

    /// Validate record data
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Dataset id cannot be empty".to_string());
        }

        if !self.key.has_parent() {
            return Err(format!("Dataset key {} must lie beneath a source root", self.key));
        }

        Ok(())
    }
}

// =============================================================================
// Folders
// =============================================================================

/// Catalog entry for an intermediate path segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRecord {
    pub id: String,
    pub key: DatasetKey,
    pub tag: ConcurrencyTag,
    pub created_at: i64,
}

impl FolderRecord {
    pub fn new(key: DatasetKey) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            key,
            tag: ConcurrencyTag::new(),
            created_at: now_millis(),
        }
    }
}

pub(crate) fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str) -> DatasetKey {
        DatasetKey::parse(path).unwrap()
    }

    #[test]
    fn test_shallow_record() {
        let record = DatasetRecord::shallow(key("src.db.t"), "handle-1");
        assert!(!record.is_extended());
        assert!(record.tag.is_none());
        assert_eq!(record.source_handle.as_deref(), Some("handle-1"));
        assert!(record.read_signature().is_none());
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_extended_record_signature() {
        let mut record = DatasetRecord::shallow(key("src.t"), "h");
        record.read_definition = Some(ReadDefinition {
            read_signature: Some(b"sig".to_vec()),
            ..Default::default()
        });
        assert!(record.is_extended());
        assert_eq!(record.read_signature(), Some(&b"sig"[..]));
    }

    #[test]
    fn test_validate_rejects_root_key() {
        let record = DatasetRecord::shallow(key("src"), "h");
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_tags_are_unique() {
        assert_ne!(ConcurrencyTag::new(), ConcurrencyTag::new());
        assert_eq!(ConcurrencyTag::from_string("t1").as_str(), "t1");
    }

    #[test]
    fn test_leaf_column_count() {
        let mut record = DatasetRecord::shallow(key("src.t"), "h");
        record.schema = vec![
            SchemaField::new("a", "int"),
            SchemaField {
                children: vec![SchemaField::new("x", "int"), SchemaField::new("y", "int")],
                ..SchemaField::new("s", "struct")
            },
        ];
        assert_eq!(record.leaf_column_count(), 3);
    }
}
