//! Ledger error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Backend write failed; in-memory indexes stay consistent.
    #[error("Storage error: {0}")]
    Storage(#[from] isnad_storage::StorageError),

    /// Unknown bundle version or bad envelope signature on import.
    #[error("Bundle incompatible: {0}")]
    BundleIncompatible(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Domain error: {0}")]
    Domain(#[from] isnad_domain::DomainError),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
