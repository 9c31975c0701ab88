//! Conversions between connector values and catalog values

use bridge_traits::{DatasetMetadata, EntityPath, Field};
use bytes::Bytes;
use core_catalog::{DatasetKey, DatasetRecord, SchemaField};

use crate::error::Result;

/// Catalog key for a path reported by a connector
pub fn dataset_key(path: &EntityPath) -> Result<DatasetKey> {
    Ok(DatasetKey::from_segments(path.components().iter().cloned())?)
}

/// Connector path for a catalog key
pub fn entity_path(key: &DatasetKey) -> EntityPath {
    EntityPath::from_components(key.segments().iter().cloned())
}

pub fn schema_fields(fields: &[Field]) -> Vec<SchemaField> {
    fields
        .iter()
        .map(|field| SchemaField {
            name: field.name.clone(),
            data_type: field.data_type.clone(),
            nullable: field.nullable,
            children: schema_fields(&field.children),
        })
        .collect()
}

fn connector_fields(fields: &[SchemaField]) -> Vec<Field> {
    fields
        .iter()
        .map(|field| Field {
            name: field.name.clone(),
            data_type: field.data_type.clone(),
            nullable: field.nullable,
            children: connector_fields(&field.children),
        })
        .collect()
}

/// Extended metadata as currently stored on a record, in the shape a
/// connector validates against
pub fn stored_metadata(record: &DatasetRecord) -> DatasetMetadata {
    let mut metadata = DatasetMetadata::new(connector_fields(&record.schema));
    if let Some(definition) = &record.read_definition {
        metadata.record_count = definition.record_count;
        metadata.partition_columns = definition.partition_columns.clone();
        metadata.extra_info = definition.extra_info.clone().map(Bytes::from);
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_catalog::ReadDefinition;

    #[test]
    fn test_key_path_round_trip() {
        let path = EntityPath::from_components(["hive", "db", "t"]);
        let key = dataset_key(&path).unwrap();
        assert_eq!(key.to_string(), "hive.db.t");
        assert_eq!(entity_path(&key), path);
    }

    #[test]
    fn test_empty_path_is_rejected() {
        assert!(dataset_key(&EntityPath::new(vec![])).is_err());
        assert!(dataset_key(&EntityPath::from_components(["hive", ""])).is_err());
    }

    #[test]
    fn test_stored_metadata_mirrors_record() {
        let mut record = DatasetRecord::shallow(DatasetKey::parse("hive.t").unwrap(), "h");
        record.schema = schema_fields(&[
            Field::new("s", "struct").with_children(vec![Field::new("x", "int")])
        ]);
        record.read_definition = Some(ReadDefinition {
            record_count: Some(7),
            partition_columns: vec!["dt".to_string()],
            extra_info: Some(vec![1, 2]),
            ..Default::default()
        });

        let metadata = stored_metadata(&record);
        assert_eq!(metadata.leaf_column_count(), 1);
        assert_eq!(metadata.schema[0].children[0].name, "x");
        assert_eq!(metadata.record_count, Some(7));
        assert_eq!(metadata.extra_info, Some(Bytes::from(vec![1, 2])));
    }
}
