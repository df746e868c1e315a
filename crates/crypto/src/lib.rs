//! Cryptographic primitives for the Isnad trust ledger
//!
//! This crate provides the three operations every signed record is built on:
//! - Ed25519 signing and verification (RFC 8032)
//! - SHA-256 content hashing with truncated hex identifiers
//! - Canonical JSON serialization (sorted keys, no whitespace, UTF-8)
//!
//! Canonical JSON is the only serialization that is ever hashed or signed.
//! Everything else (wire envelopes, storage rows) may carry extra fields, but
//! identity of a record is always a function of its canonical payload.

pub mod canonical;
pub mod signing;

pub use canonical::{canonical_json, content_id, sha256_hex, CanonicalError};
pub use signing::{sign_with_seed, verify, verify_hex, SIGNATURE_LEN, SEED_LEN};
