//! Scanner error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] isnad_storage::StorageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScannerError>;
