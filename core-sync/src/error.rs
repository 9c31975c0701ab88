use bridge_traits::BridgeError;
use core_catalog::CatalogError;
use core_runtime::config::UpdateMode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Update mode {0} cannot admit datasets; expected PREFETCH or PREFETCH_QUERIED")]
    UnsupportedUpdateMode(UpdateMode),

    #[error("Synchronizer used before setup")]
    NotSetUp,

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Connector error: {0}")]
    Connector(#[from] BridgeError),

    #[error("Dataset {key} has {actual} leaf columns, exceeding the limit of {limit}")]
    TooManyLeafColumns {
        key: String,
        limit: usize,
        actual: usize,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),
}

impl SyncError {
    /// The dataset or folder vanished, either from the catalog or upstream
    pub fn is_not_found(&self) -> bool {
        match self {
            SyncError::Catalog(e) => e.is_not_found(),
            SyncError::Connector(BridgeError::DatasetNotFound(_)) => true,
            _ => false,
        }
    }

    /// A catalog write lost an optimistic-concurrency race
    pub fn is_concurrent_modification(&self) -> bool {
        matches!(self, SyncError::Catalog(e) if e.is_concurrent_modification())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let not_found = SyncError::Catalog(CatalogError::NotFound {
            entity_type: "Dataset".to_string(),
            key: "src.t".to_string(),
        });
        assert!(not_found.is_not_found());
        assert!(!not_found.is_concurrent_modification());

        let cme = SyncError::Catalog(CatalogError::ConcurrentModification {
            key: "src.t".to_string(),
            message: "stale tag".to_string(),
        });
        assert!(cme.is_concurrent_modification());
        assert!(!cme.is_not_found());

        let vanished = SyncError::Connector(BridgeError::DatasetNotFound("src.t".to_string()));
        assert!(vanished.is_not_found());

        let failed = SyncError::Connector(BridgeError::OperationFailed("boom".to_string()));
        assert!(!failed.is_not_found());
        assert!(!failed.is_concurrent_modification());
    }

    #[test]
    fn test_unsupported_mode_message() {
        let err = SyncError::UnsupportedUpdateMode(UpdateMode::Inline);
        assert!(err.to_string().contains("INLINE"));
    }
}
