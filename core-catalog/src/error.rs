use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Entity not found: {entity_type} at {key}")]
    NotFound { entity_type: String, key: String },

    #[error("Concurrent modification of {key}: {message}")]
    ConcurrentModification { key: String, message: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl CatalogError {
    pub(crate) fn not_found(entity_type: &str, key: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn concurrent_modification(key: impl ToString, message: impl Into<String>) -> Self {
        Self::ConcurrentModification {
            key: key.to_string(),
            message: message.into(),
        }
    }

    /// The entity is absent (never existed or already deleted)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// A write was presented with a stale concurrency tag, or raced a creator
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, Self::ConcurrentModification { .. })
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
