//! Delegation registry.
//!
//! Stores capability grants under their content id with delegate and
//! principal indexes. `verify_chain` walks parent pointers from a leaf to
//! its root, checking signature, expiry, revocation, and cycles at every
//! step.

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::revocation::RevocationRegistry;
use isnad_domain::{unix_now, Delegation};
use isnad_storage::{RecordKind, StorageBackend};

/// Outcome of a full chain verification walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerdict {
    pub valid: bool,
    pub reason: String,
}

impl ChainVerdict {
    fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: reason.into(),
        }
    }
}

/// Registry of delegations with chain validation.
pub struct DelegationRegistry {
    backend: Arc<dyn StorageBackend>,
    delegations: HashMap<String, Delegation>,
    by_delegate: HashMap<String, Vec<String>>,
    by_principal: HashMap<String, Vec<String>>,
}

impl DelegationRegistry {
    /// Open the registry, loading any persisted delegations.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Result<Self> {
        let mut registry = Self {
            backend: backend.clone(),
            delegations: HashMap::new(),
            by_delegate: HashMap::new(),
            by_principal: HashMap::new(),
        };
        for (id, record) in backend.iter(RecordKind::Delegation)? {
            if let Ok(delegation) = serde_json::from_value::<Delegation>(record) {
                registry.index_in_memory(id, delegation);
            }
        }
        info!(count = registry.delegations.len(), "Delegation registry opened");
        Ok(registry)
    }

    fn index_in_memory(&mut self, id: String, delegation: Delegation) {
        self.by_delegate
            .entry(delegation.delegate.clone())
            .or_default()
            .push(id.clone());
        self.by_principal
            .entry(delegation.principal.clone())
            .or_default()
            .push(id.clone());
        self.delegations.insert(id, delegation);
    }

    /// Add a delegation if its signature verifies and it is not revoked.
    /// Returns false on silent rejection, mirroring ledger admission.
    pub fn add(&mut self, delegation: Delegation, revocations: &RevocationRegistry) -> Result<bool> {
        if !delegation.verify() {
            debug!("Rejected delegation: invalid signature");
            return Ok(false);
        }
        let id = delegation.delegation_id();
        if revocations.is_revoked(&id, None) {
            debug!(delegation_id = %id, "Rejected delegation: revoked");
            return Ok(false);
        }
        if self.delegations.contains_key(&id) {
            return Ok(false);
        }

        let record: Value = serde_json::to_value(&delegation)?;
        self.backend.put(RecordKind::Delegation, &id, &record)?;
        self.backend
            .index_add(RecordKind::Delegation, "by_delegate", &delegation.delegate, &id)?;
        self.backend
            .index_add(RecordKind::Delegation, "by_principal", &delegation.principal, &id)?;

        debug!(
            delegation_id = %id,
            principal = %delegation.principal,
            delegate = %delegation.delegate,
            "Delegation recorded"
        );
        self.index_in_memory(id, delegation);
        Ok(true)
    }

    pub fn get(&self, delegation_id: &str) -> Option<&Delegation> {
        self.delegations.get(delegation_id)
    }

    /// Active (non-expired, non-revoked) delegations held by an agent.
    pub fn delegations_for(
        &self,
        agent_id: &str,
        revocations: &RevocationRegistry,
    ) -> Vec<&Delegation> {
        let now = unix_now();
        self.by_delegate
            .get(agent_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.delegations.get(id).map(|d| (id, d)))
                    .filter(|(id, d)| !d.is_expired(now) && !revocations.is_revoked(id, None))
                    .map(|(_, d)| d)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Delegations granted by an agent.
    pub fn delegations_by(&self, agent_id: &str) -> Vec<&Delegation> {
        self.by_principal
            .get(agent_id)
            .map(|ids| ids.iter().filter_map(|id| self.delegations.get(id)).collect())
            .unwrap_or_default()
    }

    /// Whether an agent holds an active delegation covering a scope.
    pub fn is_authorized(
        &self,
        agent_id: &str,
        scope: &str,
        now: f64,
        revocations: &RevocationRegistry,
    ) -> bool {
        self.by_delegate
            .get(agent_id)
            .map(|ids| {
                ids.iter().any(|id| {
                    self.delegations
                        .get(id)
                        .map(|d| {
                            !d.is_expired(now)
                                && !revocations.is_revoked(id, None)
                                && d.scopes.iter().any(|s| s == scope)
                        })
                        .unwrap_or(false)
                })
            })
            .unwrap_or(false)
    }

    /// Verify the full chain from a leaf delegation to its root.
    pub fn verify_chain(
        &self,
        delegation_id: &str,
        now: f64,
        revocations: &RevocationRegistry,
    ) -> ChainVerdict {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current_id: Option<&str> = Some(delegation_id);

        while let Some(id) = current_id {
            if visited.contains(id) {
                return ChainVerdict::invalid("circular delegation chain");
            }
            visited.insert(id);

            let delegation = match self.delegations.get(id) {
                Some(delegation) => delegation,
                None => return ChainVerdict::invalid(format!("missing delegation {}", id)),
            };
            if !delegation.verify() {
                return ChainVerdict::invalid(format!("invalid signature on {}", id));
            }
            if delegation.is_expired(now) {
                return ChainVerdict::invalid(format!("expired delegation {}", id));
            }
            if revocations.is_revoked(id, None) {
                return ChainVerdict::invalid(format!("revoked delegation {}", id));
            }

            current_id = delegation.parent_id.as_deref();
        }

        ChainVerdict {
            valid: true,
            reason: "chain valid".to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.delegations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delegations.is_empty()
    }
}
