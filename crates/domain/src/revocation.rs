//! Revocation records.
//!
//! A revocation targets an agent id or an attestation id. With no scope the
//! revocation is global; with a scope it only covers that task label.
//! Verification checks the revoker's signature only — whether the revoker
//! had the *authority* to revoke is a policy question answered elsewhere.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::unix_now;
use isnad_crypto::{canonical_json, verify_hex};
use isnad_identity::Identity;

/// A signed revocation of an agent or attestation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Revocation {
    /// Agent id or attestation id being revoked.
    pub target_id: String,
    pub reason: String,
    /// Agent id of the revoker.
    pub revoked_by: String,
    /// None revokes every scope; Some limits the revocation to one task label.
    #[serde(default)]
    pub scope: Option<String>,
    /// Unix seconds, set at creation.
    pub timestamp: f64,
    /// Hex signature by the revoker over the canonical payload.
    #[serde(default)]
    pub signature: String,
}

impl Revocation {
    /// Create and sign a revocation as `revoker`.
    pub fn create(
        revoker: &Identity,
        target_id: &str,
        reason: &str,
        scope: Option<String>,
    ) -> Self {
        let mut revocation = Self {
            target_id: target_id.to_string(),
            reason: reason.to_string(),
            revoked_by: revoker.agent_id(),
            scope,
            timestamp: unix_now(),
            signature: String::new(),
        };
        revocation.signature = revoker.sign_hex(&revocation.payload());
        revocation
    }

    /// Canonical bytes that get signed.
    pub fn payload(&self) -> Vec<u8> {
        let data = json!({
            "action": "revoke",
            "target_id": self.target_id,
            "reason": self.reason,
            "revoked_by": self.revoked_by,
            "scope": self.scope,
            "timestamp": self.timestamp,
        });
        canonical_json(&data).expect("revocation payload is plain JSON")
    }

    /// Verify the revoker's signature against their public key.
    pub fn verify(&self, revoker_pubkey_hex: &str) -> bool {
        if self.signature.is_empty() {
            return false;
        }
        verify_hex(revoker_pubkey_hex, &self.payload(), &self.signature)
    }

    /// Whether this entry covers the given scope. A global entry covers
    /// everything; a scoped entry covers only its own label.
    pub fn covers(&self, scope: Option<&str>) -> bool {
        match &self.scope {
            None => true,
            Some(own) => scope == Some(own.as_str()),
        }
    }
}
