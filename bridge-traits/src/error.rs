use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Connector capability not available: {0}")]
    NotAvailable(String),

    #[error("Connector operation failed: {0}")]
    OperationFailed(String),

    #[error("Dataset not found in source: {0}")]
    DatasetNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
