//! Record types of the Isnad trust ledger
//!
//! Every record kind is a fixed-shape value with a canonical signed payload:
//! - [`Attestation`] — a witness's signed claim that a subject performed a task
//! - [`Revocation`] — a signed revocation of an agent or attestation, optionally scoped
//! - [`Delegation`] — a signed capability grant with scope narrowing and depth limits
//! - [`PlatformDatum`] / [`ConnectorResult`] — normalized external reputation data
//! - [`AgentProfile`] — a signed discovery registry entry
//!
//! Identifiers are derived from canonical payload bytes (truncated SHA-256),
//! so identical records have identical ids on every machine.

pub mod attestation;
pub mod delegation;
pub mod error;
pub mod platform;
pub mod profile;
pub mod revocation;

pub use attestation::Attestation;
pub use delegation::Delegation;
pub use error::DomainError;
pub use platform::{ConnectorMetrics, ConnectorResult, PlatformDatum, VerificationLevel};
pub use profile::AgentProfile;
pub use revocation::Revocation;

/// Current Unix time as fractional seconds, the timestamp form carried in
/// revocation and delegation payloads.
pub fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs_f64()
}
