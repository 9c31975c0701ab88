//! # Catalog Database Pool
//!
//! Opens the SQLite pool behind [`SqliteCatalogStore`](crate::SqliteCatalogStore).
//!
//! File databases run in WAL mode with a busy timeout, so several
//! synchronizers can write to one catalog while readers keep going. An
//! in-memory database lives inside a single connection, so its pool is pinned
//! to exactly one connection that is never recycled.
//!
//! The embedded `migrations/` are applied every time a pool is opened.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_catalog::db::{create_pool, DatabaseConfig};
//! use core_catalog::SqliteCatalogStore;
//!
//! let pool = create_pool(DatabaseConfig::new("catalog.db").max_connections(8)).await?;
//! let store = SqliteCatalogStore::new(pool);
//! ```

use crate::{CatalogError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const MEMORY_URL: &str = "sqlite::memory:";

/// Where the catalog lives and how its pool is sized
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `sqlite:<path>` or `sqlite::memory:`
    pub database_url: String,
    pub min_connections: u32,
    /// Ignored for in-memory databases
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked database before failing
    pub busy_timeout: Duration,
    /// Recycle connections after this long; `None` keeps them forever
    pub max_lifetime: Option<Duration>,
    pub idle_timeout: Option<Duration>,
    pub statement_cache_capacity: usize,
}

impl DatabaseConfig {
    /// Catalog stored in the file at `database_path`
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_url: format!("sqlite:{}", database_path.into().display()),
            max_connections: 5,
            max_lifetime: Some(Duration::from_secs(30 * 60)),
            idle_timeout: Some(Duration::from_secs(10 * 60)),
            ..Self::in_memory()
        }
    }

    /// Catalog that disappears with its pool
    pub fn in_memory() -> Self {
        Self {
            database_url: MEMORY_URL.to_string(),
            min_connections: 1,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            max_lifetime: None,
            idle_timeout: None,
            statement_cache_capacity: 100,
        }
    }

    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:")
    }

    fn pool_size(&self) -> u32 {
        if self.is_in_memory() {
            1
        } else {
            self.max_connections
        }
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(&self.database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(self.busy_timeout)
            .statement_cache_capacity(self.statement_cache_capacity);

        Ok(if self.is_in_memory() {
            options
        } else {
            options.journal_mode(SqliteJournalMode::Wal)
        })
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Open a pool, apply the catalog migrations and check the connection
pub async fn create_pool(config: DatabaseConfig) -> Result<Pool<Sqlite>> {
    let max_connections = config.pool_size();
    info!(
        database_url = %config.database_url,
        max_connections,
        "Opening catalog database"
    );

    let pool = SqlitePoolOptions::new()
        .min_connections(config.min_connections.min(max_connections))
        .max_connections(max_connections)
        .acquire_timeout(config.acquire_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .connect_with(config.connect_options()?)
        .await
        .map_err(|e| {
            warn!(error = %e, "Could not open catalog database");
            CatalogError::Database(e)
        })?;

    migrate(&pool).await?;

    sqlx::query("SELECT 1").execute(&pool).await?;
    debug!(connections = pool.size(), "Catalog database ready");

    Ok(pool)
}

/// In-memory catalog pool for tests
pub async fn create_test_pool() -> Result<Pool<Sqlite>> {
    create_pool(DatabaseConfig::in_memory()).await
}

async fn migrate(pool: &Pool<Sqlite>) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| CatalogError::Migration(e.to_string()))?;
    debug!("Catalog schema is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_config_defaults() {
        let config = DatabaseConfig::new("catalog.db")
            .max_connections(8)
            .busy_timeout(Duration::from_secs(1));

        assert_eq!(config.database_url, "sqlite:catalog.db");
        assert_eq!(config.pool_size(), 8);
        assert_eq!(config.busy_timeout, Duration::from_secs(1));
        assert!(config.max_lifetime.is_some());
        assert!(!config.is_in_memory());
    }

    #[test]
    fn test_memory_pool_is_single_connection() {
        let config = DatabaseConfig::default().max_connections(4);
        assert!(config.is_in_memory());
        assert_eq!(config.pool_size(), 1);
        assert!(config.max_lifetime.is_none());
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let pool = create_test_pool().await.unwrap();

        for table in ["catalog_datasets", "catalog_folders"] {
            let (count,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?")
                    .bind(table)
                    .fetch_one(&pool)
                    .await
                    .unwrap();
            assert_eq!(count, 1, "{} should exist", table);
        }
    }

    #[tokio::test]
    async fn test_file_database_uses_wal() {
        let dir = std::env::temp_dir().join(format!("catalog-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let pool = create_pool(DatabaseConfig::new(dir.join("catalog.db")))
            .await
            .unwrap();

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        pool.close().await;
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_reopening_file_database_keeps_schema() {
        let dir = std::env::temp_dir().join(format!("catalog-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("catalog.db");

        let first = create_pool(DatabaseConfig::new(&path)).await.unwrap();
        first.close().await;
        let second = create_pool(DatabaseConfig::new(&path)).await.unwrap();
        second.close().await;

        let _ = std::fs::remove_dir_all(&dir);
    }
}
