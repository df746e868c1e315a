//! Attestation records.
//!
//! An attestation is a signed claim: "subject performed task, witnessed by
//! witness". The signed payload is the canonical JSON of exactly
//! `{evidence, subject, task, timestamp, witness}`; the attestation id is
//! the truncated SHA-256 of those bytes. Signature and witness public key
//! travel alongside the payload fields in the wire envelope.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use isnad_crypto::{canonical_json, content_id, verify_hex};
use isnad_identity::{derive_agent_id, Identity};

/// A signed claim that `subject` performed `task`, witnessed by `witness`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attestation {
    /// Who did the work.
    pub subject: String,
    /// Who observed and vouches for it.
    pub witness: String,
    /// Free-form task label; also the scope attestations are filtered by.
    pub task: String,
    /// URI to an artifact or proof, empty when none.
    #[serde(default)]
    pub evidence: String,
    /// RFC 3339 UTC, set at creation.
    pub timestamp: String,
    /// Hex Ed25519 signature by the witness over the canonical payload.
    #[serde(default)]
    pub signature: String,
    /// Witness's hex-encoded public key.
    #[serde(default)]
    pub witness_pubkey: String,
}

impl Attestation {
    /// Create and sign an attestation as `witness`.
    pub fn create(witness: &Identity, subject: &str, task: &str, evidence: &str) -> Self {
        let mut attestation = Self {
            subject: subject.to_string(),
            witness: witness.agent_id(),
            task: task.to_string(),
            evidence: evidence.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            signature: String::new(),
            witness_pubkey: String::new(),
        };
        attestation.signature = witness.sign_hex(&attestation.payload());
        attestation.witness_pubkey = witness.public_key_hex();
        attestation
    }

    /// Canonical bytes that get signed and hashed.
    pub fn payload(&self) -> Vec<u8> {
        let claim = json!({
            "subject": self.subject,
            "witness": self.witness,
            "task": self.task,
            "evidence": self.evidence,
            "timestamp": self.timestamp,
        });
        canonical_json(&claim).expect("attestation payload is plain JSON")
    }

    /// Content-derived identifier: identical attestations share an id.
    pub fn attestation_id(&self) -> String {
        content_id(&self.payload())
    }

    /// Verify the witness's signature over the canonical payload.
    pub fn verify(&self) -> bool {
        if self.signature.is_empty() || self.witness_pubkey.is_empty() {
            return false;
        }
        verify_hex(&self.witness_pubkey, &self.payload(), &self.signature)
    }

    /// Check that the carried public key actually derives to the claimed
    /// witness id. A valid signature from the wrong identity is still a
    /// forgery.
    pub fn witness_matches_key(&self) -> bool {
        derive_agent_id(&self.witness_pubkey) == self.witness
    }

    /// Wire envelope: payload fields plus id, signature, and public key.
    pub fn to_wire(&self) -> Value {
        json!({
            "attestation_id": self.attestation_id(),
            "subject": self.subject,
            "witness": self.witness,
            "task": self.task,
            "evidence": self.evidence,
            "timestamp": self.timestamp,
            "signature": self.signature,
            "witness_pubkey": self.witness_pubkey,
        })
    }
}
