//! Agent identity management
//!
//! An agent is an Ed25519 keypair. The agent identifier is derived from the
//! public key (`agent:` + truncated SHA-256 of the hex-encoded verify key),
//! never assigned, so any party holding a public key can recompute who it
//! belongs to. This crate owns:
//! - keypair generation, loading, and the 0600 identity file on disk
//! - agent-id derivation
//! - key rotation records signed by the outgoing key

pub mod error;
pub mod identity;
pub mod rotation;

pub use error::IdentityError;
pub use identity::{derive_agent_id, Identity, IdentityFile};
pub use rotation::KeyRotation;
