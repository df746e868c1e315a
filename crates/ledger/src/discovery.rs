//! Agent discovery registry.
//!
//! Agents publish signed profiles; anyone can search them by capability or
//! name. Registration only succeeds when the profile signature verifies and
//! the agent id derives from the profile's public key, so an entry always
//! proves the agent registered itself.

use std::collections::HashMap;
use tracing::debug;

use isnad_domain::AgentProfile;

/// In-memory registry of signed agent profiles.
#[derive(Default)]
pub struct DiscoveryRegistry {
    agents: HashMap<String, AgentProfile>,
}

impl DiscoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or update a profile. Rejects unsigned, forged, and stale
    /// entries.
    pub fn register(&mut self, profile: AgentProfile) -> bool {
        if profile.signature.is_empty() || !profile.verify() || !profile.id_matches_key() {
            debug!(agent_id = %profile.agent_id, "Rejected profile registration");
            return false;
        }
        if let Some(existing) = self.agents.get(&profile.agent_id) {
            if profile.updated_at <= existing.updated_at {
                return false;
            }
        }
        self.agents.insert(profile.agent_id.clone(), profile);
        true
    }

    pub fn unregister(&mut self, agent_id: &str) -> bool {
        self.agents.remove(agent_id).is_some()
    }

    pub fn get(&self, agent_id: &str) -> Option<&AgentProfile> {
        self.agents.get(agent_id)
    }

    /// Search by capability and/or case-insensitive name substring.
    pub fn search(
        &self,
        capability: Option<&str>,
        name_contains: Option<&str>,
        limit: usize,
    ) -> Vec<&AgentProfile> {
        let needle = name_contains.map(str::to_lowercase);
        let mut results = Vec::new();
        for profile in self.agents.values() {
            if let Some(capability) = capability {
                if !profile.capabilities.iter().any(|c| c == capability) {
                    continue;
                }
            }
            if let Some(needle) = &needle {
                if !profile.name.to_lowercase().contains(needle) {
                    continue;
                }
            }
            results.push(profile);
            if results.len() >= limit {
                break;
            }
        }
        results
    }

    /// Capability census: capability -> number of agents offering it,
    /// most common first.
    pub fn list_capabilities(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for profile in self.agents.values() {
            for capability in &profile.capabilities {
                *counts.entry(capability.as_str()).or_default() += 1;
            }
        }
        let mut census: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(capability, count)| (capability.to_string(), count))
            .collect();
        census.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        census
    }

    pub fn count(&self) -> usize {
        self.agents.len()
    }

    pub fn all(&self) -> Vec<&AgentProfile> {
        self.agents.values().collect()
    }
}
