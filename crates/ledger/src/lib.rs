//! The Isnad trust ledger
//!
//! This crate is the heart of the system:
//! - [`TrustLedger`] — append-only attestation store with at-most-once
//!   admission, subject/witness indexes, scoped reputation scoring, and
//!   transitive trust
//! - [`RevocationRegistry`] — published revocations, global or scoped
//! - [`DelegationRegistry`] — capability grants with chain verification
//! - [`bundle`] — portable signed export/import of ledger slices
//! - [`DiscoveryRegistry`] — signed agent profiles with capability search
//!
//! The ledger persists through any [`isnad_storage::StorageBackend`] and
//! never knows which one it holds.

pub mod bundle;
pub mod chain;
pub mod delegation;
pub mod discovery;
pub mod error;
pub mod revocation;
pub mod trust_check;

pub use bundle::{export_bundle, from_bundle, Bundle, BundleStats, BUNDLE_VERSION};
pub use chain::{LedgerStats, TrustLedger, BASE_WEIGHT, CHAIN_DECAY, SAME_WITNESS_DECAY};
pub use delegation::{ChainVerdict, DelegationRegistry};
pub use discovery::DiscoveryRegistry;
pub use error::LedgerError;
pub use revocation::RevocationRegistry;
pub use trust_check::TrustCheck;
