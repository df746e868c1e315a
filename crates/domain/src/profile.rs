//! Discovery profiles.
//!
//! Agents publish a signed profile (name, capabilities, endpoints) so other
//! agents can find them. The signature proves the agent registered itself:
//! the profile payload is signed with the key the agent id derives from.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

use crate::unix_now;
use isnad_crypto::{canonical_json, verify_hex};
use isnad_identity::{derive_agent_id, Identity};

/// Public profile an agent registers in the discovery registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentProfile {
    pub agent_id: String,
    pub public_key: String,
    pub name: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// protocol -> url
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
    #[serde(default)]
    pub registered_at: f64,
    #[serde(default)]
    pub updated_at: f64,
    #[serde(default)]
    pub signature: String,
}

impl AgentProfile {
    /// Create and sign a profile for `identity`.
    pub fn create(
        identity: &Identity,
        name: &str,
        capabilities: Vec<String>,
        endpoints: BTreeMap<String, String>,
    ) -> Self {
        let now = unix_now();
        let mut sorted_caps = capabilities;
        sorted_caps.sort();

        let mut profile = Self {
            agent_id: identity.agent_id(),
            public_key: identity.public_key_hex(),
            name: name.to_string(),
            capabilities: sorted_caps,
            endpoints,
            registered_at: now,
            updated_at: now,
            signature: String::new(),
        };
        profile.signature = identity.sign_hex(&profile.payload());
        profile
    }

    /// Canonical bytes for signing, excluding the signature itself.
    pub fn payload(&self) -> Vec<u8> {
        let data = json!({
            "agent_id": self.agent_id,
            "public_key": self.public_key,
            "name": self.name,
            "capabilities": self.capabilities,
            "endpoints": self.endpoints,
            "registered_at": self.registered_at,
            "updated_at": self.updated_at,
        });
        canonical_json(&data).expect("profile payload is plain JSON")
    }

    /// Verify the profile signature against the carried public key.
    pub fn verify(&self) -> bool {
        if self.signature.is_empty() {
            return false;
        }
        verify_hex(&self.public_key, &self.payload(), &self.signature)
    }

    /// Check the agent id actually derives from the carried public key.
    pub fn id_matches_key(&self) -> bool {
        derive_agent_id(&self.public_key) == self.agent_id
    }
}
