//! The trust ledger: admission, indexes, and trust computation.
//!
//! Admission pipeline, in order: verify the witness signature, check the
//! witness id derives from the carried key, consult the revocation registry,
//! reject duplicates by content id, then persist and index. Cryptographic
//! failures reject silently (`Ok(false)`) — only storage failures surface
//! as errors, and those leave the in-memory indexes untouched.

use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::revocation::RevocationRegistry;
use isnad_domain::{Attestation, Revocation};
use isnad_identity::KeyRotation;
use isnad_storage::{MemoryBackend, RecordKind, StorageBackend};

/// Weight each attestation contributes before penalties.
pub const BASE_WEIGHT: f64 = 0.2;

/// Multiplier applied per repeated attestation from the same witness.
pub const SAME_WITNESS_DECAY: f64 = 0.5;

/// Trust multiplier per hop of transitive trust.
pub const CHAIN_DECAY: f64 = 0.7;

/// Aggregate counts for stats endpoints and bundle envelopes.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LedgerStats {
    pub count: usize,
    pub subjects: usize,
    pub witnesses: usize,
}

/// Append-only attestation ledger with revocation-aware trust scoring.
pub struct TrustLedger {
    backend: Arc<dyn StorageBackend>,
    attestations: Vec<Attestation>,
    /// subject -> positions in `attestations`, insertion order
    by_subject: HashMap<String, Vec<usize>>,
    /// witness -> positions in `attestations`, insertion order
    by_witness: HashMap<String, Vec<usize>>,
    /// content ids already admitted
    ids: HashSet<String>,
    revocations: RevocationRegistry,
}

impl TrustLedger {
    /// Open a ledger over a backend, replaying persisted records.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Result<Self> {
        let revocations = RevocationRegistry::new(backend.clone())?;
        let mut ledger = Self {
            backend: backend.clone(),
            attestations: Vec::new(),
            by_subject: HashMap::new(),
            by_witness: HashMap::new(),
            ids: HashSet::new(),
            revocations,
        };

        for (id, record) in backend.iter(RecordKind::Attestation)? {
            match serde_json::from_value::<Attestation>(record) {
                Ok(attestation) => ledger.index_in_memory(attestation, &id),
                Err(e) => warn!(id = %id, error = %e, "Skipping unreadable attestation record"),
            }
        }

        info!(count = ledger.attestations.len(), "Trust ledger opened");
        Ok(ledger)
    }

    /// Ledger over a fresh in-memory backend, for tests and bundle import.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new())).expect("memory backend cannot fail to open")
    }

    fn index_in_memory(&mut self, attestation: Attestation, id: &str) {
        let position = self.attestations.len();
        self.by_subject
            .entry(attestation.subject.clone())
            .or_default()
            .push(position);
        self.by_witness
            .entry(attestation.witness.clone())
            .or_default()
            .push(position);
        self.ids.insert(id.to_string());
        self.attestations.push(attestation);
    }

    /// Admit an attestation.
    ///
    /// Returns `Ok(true)` when admitted, `Ok(false)` on any silent
    /// rejection (bad signature, witness mismatch, revoked, duplicate),
    /// and `Err` only when the backend write fails.
    pub fn add(&mut self, attestation: Attestation) -> Result<bool> {
        let id = attestation.attestation_id();

        if !attestation.verify() {
            debug!(attestation_id = %id, "Rejected: invalid signature");
            return Ok(false);
        }
        if !attestation.witness_matches_key() {
            debug!(
                attestation_id = %id,
                witness = %attestation.witness,
                "Rejected: witness id does not derive from carried key"
            );
            return Ok(false);
        }
        if self.revocations.is_revoked(&id, None)
            || self.revocations.is_revoked(&attestation.subject, None)
        {
            debug!(attestation_id = %id, "Rejected: revoked");
            return Ok(false);
        }
        if self.ids.contains(&id) {
            return Ok(false);
        }

        // Persist before indexing so a storage failure leaves memory
        // consistent with what readers already saw.
        let record: Value = attestation.to_wire();
        self.backend.put(RecordKind::Attestation, &id, &record)?;
        self.backend
            .index_add(RecordKind::Attestation, "by_subject", &attestation.subject, &id)?;
        self.backend
            .index_add(RecordKind::Attestation, "by_witness", &attestation.witness, &id)?;

        debug!(
            attestation_id = %id,
            subject = %attestation.subject,
            witness = %attestation.witness,
            task = %attestation.task,
            "Attestation admitted"
        );
        self.index_in_memory(attestation, &id);
        Ok(true)
    }

    /// Record a revocation and make it visible to subsequent admissions
    /// and scores atomically with this call.
    pub fn revoke(&mut self, entry: Revocation) -> Result<()> {
        self.revocations.revoke(entry)
    }

    pub fn is_revoked(&self, target_id: &str, scope: Option<&str>) -> bool {
        self.revocations.is_revoked(target_id, scope)
    }

    pub fn revocations(&self) -> &RevocationRegistry {
        &self.revocations
    }

    /// Store a verified key-rotation record. Historical attestations keep
    /// their original subject/witness ids.
    pub fn add_rotation(&mut self, rotation: KeyRotation) -> Result<bool> {
        if !rotation.verify() {
            return Ok(false);
        }
        let id = rotation.rotation_id();
        let record = serde_json::to_value(&rotation)?;
        Ok(self.backend.put(RecordKind::KeyRotation, &id, &record)?)
    }

    /// All stored key-rotation records.
    pub fn rotations(&self) -> Result<Vec<KeyRotation>> {
        Ok(self
            .backend
            .iter(RecordKind::KeyRotation)?
            .into_iter()
            .filter_map(|(_, record)| serde_json::from_value(record).ok())
            .collect())
    }

    /// Scoped reputation score in [0, 1].
    ///
    /// Each attestation contributes `BASE_WEIGHT`, halved for every prior
    /// attestation from the same witness within the (scope-filtered) list.
    /// Revoked agents score zero, always.
    pub fn trust_score(&self, agent_id: &str, scope: Option<&str>) -> f64 {
        if self.revocations.is_revoked(agent_id, scope) {
            return 0.0;
        }

        let positions = match self.by_subject.get(agent_id) {
            Some(positions) => positions,
            None => return 0.0,
        };

        let scope_lower = scope.map(str::to_lowercase);
        let mut score = 0.0;
        let mut witness_counts: HashMap<&str, u32> = HashMap::new();

        for &position in positions {
            let attestation = &self.attestations[position];
            if let Some(scope_lower) = &scope_lower {
                if !attestation.task.to_lowercase().contains(scope_lower) {
                    continue;
                }
            }
            let count = witness_counts
                .entry(attestation.witness.as_str())
                .and_modify(|c| *c += 1)
                .or_insert(1);
            let penalty = SAME_WITNESS_DECAY.powi(*count as i32 - 1);
            score += BASE_WEIGHT * penalty;
        }

        score.min(1.0)
    }

    /// Transitive trust from `source` to `target` in [0, 1].
    ///
    /// BFS over witness->subject edges with `CHAIN_DECAY` per hop; the
    /// result is the maximum over all paths within the hop budget. A
    /// missing or disconnected target scores zero; `source == target`
    /// is 1.0 by definition.
    pub fn chain_trust(&self, source: &str, target: &str, max_hops: u32) -> f64 {
        if source == target {
            return 1.0;
        }

        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(source);
        let mut queue: VecDeque<(&str, f64, u32)> = VecDeque::new();
        queue.push_back((source, 1.0, 0));
        let mut best_trust: f64 = 0.0;

        while let Some((current, trust, hops)) = queue.pop_front() {
            if hops >= max_hops {
                continue;
            }
            if let Some(positions) = self.by_witness.get(current) {
                for &position in positions {
                    let next_agent = self.attestations[position].subject.as_str();
                    let next_trust = trust * CHAIN_DECAY;
                    if next_agent == target {
                        best_trust = best_trust.max(next_trust);
                    } else if !visited.contains(next_agent) {
                        visited.insert(next_agent);
                        queue.push_back((next_agent, next_trust, hops + 1));
                    }
                }
            }
        }

        best_trust
    }

    /// Attestations naming the agent as subject, insertion order.
    pub fn by_subject(&self, agent_id: &str) -> Vec<&Attestation> {
        self.by_subject
            .get(agent_id)
            .map(|positions| positions.iter().map(|&p| &self.attestations[p]).collect())
            .unwrap_or_default()
    }

    /// Attestations naming the agent as witness, insertion order.
    pub fn by_witness(&self, agent_id: &str) -> Vec<&Attestation> {
        self.by_witness
            .get(agent_id)
            .map(|positions| positions.iter().map(|&p| &self.attestations[p]).collect())
            .unwrap_or_default()
    }

    /// Look up an attestation by content id.
    pub fn get(&self, attestation_id: &str) -> Option<&Attestation> {
        if !self.ids.contains(attestation_id) {
            return None;
        }
        self.attestations
            .iter()
            .find(|a| a.attestation_id() == attestation_id)
    }

    pub fn contains(&self, attestation_id: &str) -> bool {
        self.ids.contains(attestation_id)
    }

    /// All attestations in insertion order.
    pub fn attestations(&self) -> &[Attestation] {
        &self.attestations
    }

    pub fn len(&self) -> usize {
        self.attestations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attestations.is_empty()
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            count: self.attestations.len(),
            subjects: self.by_subject.len(),
            witnesses: self.by_witness.len(),
        }
    }

    /// Compliance erasure: remove every record mentioning the agent from
    /// the backend and rebuild the in-memory view.
    pub fn erase_agent(&mut self, agent_id: &str) -> Result<usize> {
        let removed = self.backend.delete_by_agent(agent_id)?;

        self.attestations
            .retain(|a| a.subject != agent_id && a.witness != agent_id);
        let attestations = std::mem::take(&mut self.attestations);
        self.by_subject.clear();
        self.by_witness.clear();
        self.ids.clear();
        for attestation in attestations {
            let id = attestation.attestation_id();
            self.index_in_memory(attestation, &id);
        }
        self.revocations.forget_agent(agent_id);

        info!(agent_id = %agent_id, removed = removed, "Agent erased from ledger");
        Ok(removed)
    }

    /// The backing store, shared with the registries and trust-check log.
    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }
}
