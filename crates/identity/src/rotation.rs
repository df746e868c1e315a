//! Key rotation records.
//!
//! A rotation binds an old public key to its replacement. The record is
//! signed by the OLD key: holding the outgoing key is what proves the right
//! to rotate. The ledger keeps rotation records as chain-of-custody evidence
//! and does not rewrite historical attestations to the new key.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::identity::{derive_agent_id, Identity};
use isnad_crypto::{canonical_json, content_id, verify_hex};

/// Signed proof that an agent rotated from one key to another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyRotation {
    pub old_pubkey: String,
    pub new_pubkey: String,
    pub old_agent_id: String,
    pub new_agent_id: String,
    /// RFC 3339, set at creation.
    pub timestamp: String,
    /// Hex signature by the old key over the canonical payload.
    pub signature: String,
}

impl KeyRotation {
    /// Create a rotation record signed by `old`.
    pub fn create(old: &Identity, new: &Identity) -> Self {
        let timestamp = Utc::now().to_rfc3339();
        let payload = Self::payload(&old.public_key_hex(), &new.public_key_hex(), &timestamp);
        let signature = old.sign_hex(&payload);
        Self {
            old_pubkey: old.public_key_hex(),
            new_pubkey: new.public_key_hex(),
            old_agent_id: old.agent_id(),
            new_agent_id: new.agent_id(),
            timestamp,
            signature,
        }
    }

    /// Verify the rotation was signed by the old key and that the carried
    /// agent ids derive from the carried public keys.
    pub fn verify(&self) -> bool {
        if derive_agent_id(&self.old_pubkey) != self.old_agent_id
            || derive_agent_id(&self.new_pubkey) != self.new_agent_id
        {
            return false;
        }
        let payload = Self::payload(&self.old_pubkey, &self.new_pubkey, &self.timestamp);
        verify_hex(&self.old_pubkey, &payload, &self.signature)
    }

    /// Content-derived identifier over the signed payload.
    pub fn rotation_id(&self) -> String {
        content_id(&Self::payload(
            &self.old_pubkey,
            &self.new_pubkey,
            &self.timestamp,
        ))
    }

    fn payload(old_pubkey: &str, new_pubkey: &str, timestamp: &str) -> Vec<u8> {
        let value = json!({
            "action": "key_rotation",
            "old_pubkey": old_pubkey,
            "new_pubkey": new_pubkey,
            "timestamp": timestamp,
        });
        canonical_json(&value).expect("rotation payload is plain JSON")
    }
}
