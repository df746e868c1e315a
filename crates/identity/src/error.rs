//! Identity error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IdentityError>;
