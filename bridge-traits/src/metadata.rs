//! Dataset Metadata Types
//!
//! Values exchanged between a connector and the core: the path a connector
//! reports for a dataset, the handle it hands out during listing, and the
//! extended metadata it derives on request.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Path of an entity as reported by a connector.
///
/// The first component is the source name; the remaining components are the
/// connector's own hierarchy (database/table, bucket/prefix/file, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityPath(Vec<String>);

impl EntityPath {
    pub fn new(components: Vec<String>) -> Self {
        Self(components)
    }

    /// Build a path from anything that yields string-like components
    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(components.into_iter().map(Into::into).collect())
    }

    pub fn components(&self) -> &[String] {
        &self.0
    }

    pub fn into_components(self) -> Vec<String> {
        self.0
    }

    /// Number of components in the path
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Last component, typically the dataset name
    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// A connector's transient reference to one dataset discovered during listing.
///
/// `id` is opaque to the core; connectors use it to find the dataset again
/// when extended metadata is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetHandle {
    pub id: String,
    pub path: EntityPath,
}

impl DatasetHandle {
    pub fn new(id: impl Into<String>, path: EntityPath) -> Self {
        Self {
            id: id.into(),
            path,
        }
    }

    pub fn path(&self) -> &EntityPath {
        &self.path
    }
}

/// A column in a dataset schema. Nested types carry their children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Field>,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<Field>) -> Self {
        self.children = children;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Number of leaf columns under (and including) this field
    pub fn leaf_count(&self) -> usize {
        if self.children.is_empty() {
            1
        } else {
            self.children.iter().map(Field::leaf_count).sum()
        }
    }
}

/// Extended metadata derived by a connector for one dataset.
///
/// Deriving it is expensive (schema inference, partition listing), which is
/// why the core tries hard to avoid asking for it when a read signature says
/// nothing changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetMetadata {
    pub schema: Vec<Field>,
    pub record_count: Option<u64>,
    pub partition_columns: Vec<String>,
    /// Connector-private bytes carried alongside the metadata
    pub extra_info: Option<Bytes>,
}

impl DatasetMetadata {
    pub fn new(schema: Vec<Field>) -> Self {
        Self {
            schema,
            ..Default::default()
        }
    }

    pub fn with_record_count(mut self, count: u64) -> Self {
        self.record_count = Some(count);
        self
    }

    pub fn with_partition_columns(mut self, columns: Vec<String>) -> Self {
        self.partition_columns = columns;
        self
    }

    pub fn with_extra_info(mut self, extra_info: Bytes) -> Self {
        self.extra_info = Some(extra_info);
        self
    }

    /// Total number of leaf columns in the schema
    pub fn leaf_column_count(&self) -> usize {
        self.schema.iter().map(Field::leaf_count).sum()
    }
}

/// Outcome of comparing a stored read signature against the source's
/// current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataValidity {
    /// Stored metadata still describes the dataset
    Valid,
    /// Stored metadata is stale (or there was no signature to compare)
    Invalid,
}

/// Options passed to connectors when resolving dataset handles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetDatasetOptions {
    /// Ask the connector to skip entries it cannot describe instead of failing
    pub ignore_authz_errors: bool,
}

/// Options passed to connectors when deriving extended metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetMetadataOptions {
    /// Upper bound on leaf columns the catalog is willing to store
    pub max_leaf_columns: usize,
}

impl Default for GetMetadataOptions {
    fn default() -> Self {
        Self {
            max_leaf_columns: 800,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_path_accessors() {
        let path = EntityPath::from_components(["hive", "db1", "kv"]);
        assert_eq!(path.size(), 3);
        assert_eq!(path.name(), Some("kv"));
        assert_eq!(path.to_string(), "hive.db1.kv");
        assert_eq!(path.components()[0], "hive");
    }

    #[test]
    fn test_leaf_column_count_counts_nested_children() {
        let metadata = DatasetMetadata::new(vec![
            Field::new("id", "bigint").not_null(),
            Field::new("address", "struct").with_children(vec![
                Field::new("street", "varchar"),
                Field::new("geo", "struct").with_children(vec![
                    Field::new("lat", "double"),
                    Field::new("lon", "double"),
                ]),
            ]),
        ]);

        assert_eq!(metadata.leaf_column_count(), 4);
    }

    #[test]
    fn test_metadata_builder() {
        let metadata = DatasetMetadata::new(vec![Field::new("a", "int")])
            .with_record_count(42)
            .with_partition_columns(vec!["dt".to_string()])
            .with_extra_info(Bytes::from_static(b"x"));

        assert_eq!(metadata.record_count, Some(42));
        assert_eq!(metadata.partition_columns, vec!["dt".to_string()]);
        assert_eq!(metadata.extra_info, Some(Bytes::from_static(b"x")));
    }
}
