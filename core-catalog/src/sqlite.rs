//! SQLite catalog store
//!
//! Persistent [`CatalogStore`] over an `sqlx` pool created by
//! [`create_pool`](crate::db::create_pool). Each write runs in its own
//! transaction; tag checks and the write itself happen inside it, so a stale
//! tag can never overwrite a newer record.

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::collections::HashSet;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{CatalogError, Result};
use crate::key::DatasetKey;
use crate::models::{now_millis, ConcurrencyTag, DatasetRecord, FolderRecord, ReadDefinition};
use crate::store::CatalogStore;

/// Upper bound (exclusive) of the storage range holding every key beneath
/// `key`. The separator is U+001F, so bumping it to U+0020 closes the range.
fn range_end(key: &DatasetKey) -> String {
    let mut end = key.storage_path();
    end.push('\u{20}');
    end
}

/// SQLite implementation of [`CatalogStore`]
#[derive(Debug, Clone)]
pub struct SqliteCatalogStore {
    pool: SqlitePool,
}

impl SqliteCatalogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn list_paths_under(&self, table: &str, root: &DatasetKey) -> Result<HashSet<DatasetKey>> {
        let sql = format!("SELECT path FROM {} WHERE path >= ? AND path < ?", table);
        let rows = sqlx::query(&sql)
            .bind(root.storage_prefix())
            .bind(range_end(root))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| DatasetKey::from_storage_path(&row.try_get::<String, _>("path")?))
            .collect()
    }

    async fn insert_dataset(
        tx: &mut Transaction<'_, Sqlite>,
        record: &DatasetRecord,
        tag: &ConcurrencyTag,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO catalog_datasets (
                id, path, source_handle, tag, owner, description, schema_json,
                read_definition, created_at, last_modified
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(record.key.storage_path())
        .bind(&record.source_handle)
        .bind(tag.as_str())
        .bind(&record.owner)
        .bind(&record.description)
        .bind(serde_json::to_string(&record.schema)?)
        .bind(encode_read_definition(&record.read_definition)?)
        .bind(record.created_at)
        .bind(record.last_modified)
        .execute(&mut **tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(
                CatalogError::concurrent_modification(&record.key, "dataset already exists"),
            ),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_dataset(
        tx: &mut Transaction<'_, Sqlite>,
        record: &DatasetRecord,
        presented: &ConcurrencyTag,
        tag: &ConcurrencyTag,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE catalog_datasets
            SET source_handle = ?, tag = ?, owner = ?, description = ?, schema_json = ?,
                read_definition = ?, last_modified = ?
            WHERE path = ? AND tag = ?
            "#,
        )
        .bind(&record.source_handle)
        .bind(tag.as_str())
        .bind(&record.owner)
        .bind(&record.description)
        .bind(serde_json::to_string(&record.schema)?)
        .bind(encode_read_definition(&record.read_definition)?)
        .bind(record.last_modified)
        .bind(record.key.storage_path())
        .bind(presented.as_str())
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(CatalogError::concurrent_modification(&record.key, "stale tag"));
        }
        Ok(())
    }

    async fn ensure_ancestors(tx: &mut Transaction<'_, Sqlite>, key: &DatasetKey) -> Result<()> {
        for ancestor in key.ancestors() {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO catalog_folders (id, path, tag, created_at)
                VALUES (?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(ancestor.storage_path())
            .bind(ConcurrencyTag::new().as_str())
            .bind(now_millis())
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn stored_tag(
        tx: &mut Transaction<'_, Sqlite>,
        table: &str,
        key: &DatasetKey,
    ) -> Result<Option<String>> {
        let sql = format!("SELECT tag FROM {} WHERE path = ?", table);
        let row = sqlx::query(&sql)
            .bind(key.storage_path())
            .fetch_optional(&mut **tx)
            .await?;
        row.map(|row| row.try_get::<String, _>("tag"))
            .transpose()
            .map_err(CatalogError::from)
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn list_keys_under(&self, root: &DatasetKey) -> Result<HashSet<DatasetKey>> {
        self.list_paths_under("catalog_datasets", root).await
    }

    async fn get_dataset(&self, key: &DatasetKey) -> Result<DatasetRecord> {
        let row = sqlx::query("SELECT * FROM catalog_datasets WHERE path = ?")
            .bind(key.storage_path())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found("Dataset", key))?;
        row_to_dataset(&row)
    }

    #[instrument(skip(self, record), fields(key = %record.key))]
    async fn add_or_update_dataset(&self, mut record: DatasetRecord) -> Result<DatasetRecord> {
        record
            .validate()
            .map_err(|message| CatalogError::InvalidInput {
                field: "DatasetRecord".to_string(),
                message,
            })?;

        let tag = ConcurrencyTag::new();
        record.last_modified = now_millis();

        let mut tx = self.pool.begin().await?;
        match record.tag.clone() {
            None => {
                Self::insert_dataset(&mut tx, &record, &tag).await?;
                debug!("Inserted dataset");
            }
            Some(presented) => {
                let row = sqlx::query("SELECT created_at FROM catalog_datasets WHERE path = ?")
                    .bind(record.key.storage_path())
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or_else(|| CatalogError::not_found("Dataset", &record.key))?;
                record.created_at = row.try_get("created_at")?;
                Self::update_dataset(&mut tx, &record, &presented, &tag).await?;
                debug!("Updated dataset");
            }
        }
        Self::ensure_ancestors(&mut tx, &record.key).await?;
        tx.commit().await?;

        record.tag = Some(tag);
        Ok(record)
    }

    #[instrument(skip(self, tag), fields(key = %key))]
    async fn delete_dataset(&self, key: &DatasetKey, tag: &ConcurrencyTag) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        match Self::stored_tag(&mut tx, "catalog_datasets", key).await? {
            None => return Err(CatalogError::not_found("Dataset", key)),
            Some(stored) if stored != tag.as_str() => {
                return Err(CatalogError::concurrent_modification(key, "stale tag"));
            }
            Some(_) => {}
        }

        sqlx::query("DELETE FROM catalog_datasets WHERE path = ?")
            .bind(key.storage_path())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        debug!("Deleted dataset");
        Ok(())
    }

    async fn get_folder(&self, key: &DatasetKey) -> Result<FolderRecord> {
        let row = sqlx::query("SELECT * FROM catalog_folders WHERE path = ?")
            .bind(key.storage_path())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CatalogError::not_found("Folder", key))?;

        Ok(FolderRecord {
            id: row.try_get("id")?,
            key: key.clone(),
            tag: ConcurrencyTag::from_string(row.try_get::<String, _>("tag")?),
            created_at: row.try_get("created_at")?,
        })
    }

    #[instrument(skip(self, tag), fields(key = %key))]
    async fn delete_folder(&self, key: &DatasetKey, tag: &ConcurrencyTag) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        match Self::stored_tag(&mut tx, "catalog_folders", key).await? {
            None => return Err(CatalogError::not_found("Folder", key)),
            Some(stored) if stored != tag.as_str() => {
                return Err(CatalogError::concurrent_modification(key, "stale tag"));
            }
            Some(_) => {}
        }

        sqlx::query("DELETE FROM catalog_folders WHERE path = ?")
            .bind(key.storage_path())
            .execute(&mut *tx)
            .await?;

        for table in ["catalog_folders", "catalog_datasets"] {
            let sql = format!("DELETE FROM {} WHERE path >= ? AND path < ?", table);
            let removed = sqlx::query(&sql)
                .bind(key.storage_prefix())
                .bind(range_end(key))
                .execute(&mut *tx)
                .await?;
            debug!(table, removed = removed.rows_affected(), "Removed entries beneath folder");
        }
        tx.commit().await?;

        debug!("Deleted folder");
        Ok(())
    }

    async fn list_folders_under(&self, root: &DatasetKey) -> Result<HashSet<DatasetKey>> {
        self.list_paths_under("catalog_folders", root).await
    }
}

fn encode_read_definition(definition: &Option<ReadDefinition>) -> Result<Option<String>> {
    definition
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(CatalogError::from)
}

fn row_to_dataset(row: &SqliteRow) -> Result<DatasetRecord> {
    let schema_json: String = row.try_get("schema_json")?;
    let read_definition: Option<String> = row.try_get("read_definition")?;

    Ok(DatasetRecord {
        id: row.try_get("id")?,
        key: DatasetKey::from_storage_path(&row.try_get::<String, _>("path")?)?,
        source_handle: row.try_get("source_handle")?,
        tag: Some(ConcurrencyTag::from_string(row.try_get::<String, _>("tag")?)),
        owner: row.try_get("owner")?,
        description: row.try_get("description")?,
        schema: serde_json::from_str(&schema_json)?,
        read_definition: read_definition
            .map(|json| serde_json::from_str(&json))
            .transpose()?,
        created_at: row.try_get("created_at")?,
        last_modified: row.try_get("last_modified")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn key(path: &str) -> DatasetKey {
        DatasetKey::parse(path).unwrap()
    }

    #[tokio::test]
    async fn test_range_excludes_sibling_roots() {
        let store = SqliteCatalogStore::new(create_test_pool().await.unwrap());
        for path in ["src.a", "src.b.c", "srcx.a", "src!.a", "other.a"] {
            store
                .add_or_update_dataset(DatasetRecord::shallow(key(path), "h"))
                .await
                .unwrap();
        }

        let keys = store.list_keys_under(&key("src")).await.unwrap();
        assert_eq!(keys, HashSet::from([key("src.a"), key("src.b.c")]));
    }

    #[tokio::test]
    async fn test_read_definition_round_trip() {
        let store = SqliteCatalogStore::new(create_test_pool().await.unwrap());
        let mut record = DatasetRecord::shallow(key("src.t"), "h").with_description("orders");
        record.read_definition = Some(ReadDefinition {
            read_signature: Some(vec![0, 1, 2]),
            record_count: Some(10),
            partition_columns: vec!["dt".to_string()],
            extra_info: None,
            last_refresh_date: 1_700_000_000_000,
        });

        let stored = store.add_or_update_dataset(record.clone()).await.unwrap();
        let fetched = store.get_dataset(&key("src.t")).await.unwrap();

        assert_eq!(fetched.read_definition, record.read_definition);
        assert_eq!(fetched.description.as_deref(), Some("orders"));
        assert_eq!(fetched.tag, stored.tag);
        assert_eq!(fetched.id, record.id);
    }
}
