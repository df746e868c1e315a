//! Revocation registry.
//!
//! Keyed by target id (an agent id or attestation id). A global entry
//! (no scope) revokes everything for the target; a scoped entry revokes a
//! single task label. There is no unrevoke: once a target is revoked the
//! registry answers true for the matching scope until the records are
//! erased wholesale.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use isnad_domain::Revocation;
use isnad_storage::{RecordKind, StorageBackend};

/// Registry of revoked agents and attestations.
pub struct RevocationRegistry {
    backend: Arc<dyn StorageBackend>,
    /// target_id -> entries
    revoked: HashMap<String, Vec<Revocation>>,
}

impl RevocationRegistry {
    /// Open the registry, loading any persisted entries.
    pub fn new(backend: Arc<dyn StorageBackend>) -> Result<Self> {
        let mut revoked: HashMap<String, Vec<Revocation>> = HashMap::new();
        for (_, record) in backend.iter(RecordKind::Revocation)? {
            if let Ok(entry) = serde_json::from_value::<Revocation>(record) {
                revoked
                    .entry(entry.target_id.clone())
                    .or_default()
                    .push(entry);
            }
        }
        Ok(Self { backend, revoked })
    }

    /// Add a signed revocation entry.
    ///
    /// Signature validity is the admission layer's concern; whether the
    /// revoker had authority over the target is a policy question. The
    /// registry records what was published.
    pub fn revoke(&mut self, entry: Revocation) -> Result<()> {
        let record: Value = serde_json::to_value(&entry)?;
        let id = isnad_crypto::content_id(&entry.payload());
        self.backend.put(RecordKind::Revocation, &id, &record)?;
        self.backend
            .index_add(RecordKind::Revocation, "by_target", &entry.target_id, &id)?;

        info!(
            target_id = %entry.target_id,
            revoked_by = %entry.revoked_by,
            scope = ?entry.scope,
            "Revocation recorded"
        );
        self.revoked
            .entry(entry.target_id.clone())
            .or_default()
            .push(entry);
        Ok(())
    }

    /// Whether a target is revoked for the given scope.
    pub fn is_revoked(&self, target_id: &str, scope: Option<&str>) -> bool {
        self.revoked
            .get(target_id)
            .map(|entries| entries.iter().any(|entry| entry.covers(scope)))
            .unwrap_or(false)
    }

    /// All revocation entries for a target.
    pub fn entries_for(&self, target_id: &str) -> &[Revocation] {
        self.revoked
            .get(target_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every entry in the registry.
    pub fn all_entries(&self) -> Vec<&Revocation> {
        self.revoked.values().flatten().collect()
    }

    pub fn len(&self) -> usize {
        self.revoked.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }

    /// Drop in-memory entries for an erased agent (the backend rows are
    /// removed by `delete_by_agent`).
    pub(crate) fn forget_agent(&mut self, agent_id: &str) {
        self.revoked.remove(agent_id);
        for entries in self.revoked.values_mut() {
            entries.retain(|entry| entry.revoked_by != agent_id);
        }
        self.revoked.retain(|_, entries| !entries.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isnad_identity::Identity;
    use isnad_storage::MemoryBackend;

    fn new_registry() -> RevocationRegistry {
        RevocationRegistry::new(Arc::new(MemoryBackend::new())).unwrap()
    }

    #[test]
    fn test_global_revocation() {
        let mut registry = new_registry();
        let revoker = Identity::generate();
        registry
            .revoke(Revocation::create(&revoker, "agent:target", "compromised", None))
            .unwrap();

        assert!(registry.is_revoked("agent:target", None));
        assert!(registry.is_revoked("agent:target", Some("trade")));
        assert!(!registry.is_revoked("agent:other", None));
    }

    #[test]
    fn test_scoped_revocation() {
        let mut registry = new_registry();
        let revoker = Identity::generate();
        registry
            .revoke(Revocation::create(
                &revoker,
                "agent:target",
                "bad trades",
                Some("trade".into()),
            ))
            .unwrap();

        assert!(!registry.is_revoked("agent:target", None));
        assert!(registry.is_revoked("agent:target", Some("trade")));
        assert!(!registry.is_revoked("agent:target", Some("review")));
    }

    #[test]
    fn test_entries_accumulate() {
        let mut registry = new_registry();
        let revoker = Identity::generate();
        registry
            .revoke(Revocation::create(&revoker, "t", "one", Some("a".into())))
            .unwrap();
        registry
            .revoke(Revocation::create(&revoker, "t", "two", Some("b".into())))
            .unwrap();

        assert_eq!(registry.entries_for("t").len(), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        let revoker = Identity::generate();

        {
            let mut registry = RevocationRegistry::new(backend.clone()).unwrap();
            registry
                .revoke(Revocation::create(&revoker, "agent:x", "fraud", None))
                .unwrap();
        }

        let registry = RevocationRegistry::new(backend).unwrap();
        assert!(registry.is_revoked("agent:x", None));
        assert_eq!(registry.len(), 1);
    }
}
