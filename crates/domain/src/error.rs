//! Domain error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    /// Missing required field or wrong shape in an input record.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// Sub-delegation violates scope, depth, or expiry narrowing rules.
    #[error("Delegation constraint: {0}")]
    DelegationConstraint(String),

    #[error("Canonicalization error: {0}")]
    Canonical(#[from] isnad_crypto::CanonicalError),
}

pub type Result<T> = std::result::Result<T, DomainError>;
