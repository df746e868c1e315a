//! In-memory backend for tests and ephemeral ledgers.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::backend::{record_mentions_agent, RecordKind, StorageBackend};
use crate::error::Result;

#[derive(Default)]
struct MemoryState {
    /// kind -> insertion-ordered (id, record)
    records: HashMap<&'static str, Vec<(String, Value)>>,
    /// (kind, index_name, key) -> ids
    indexes: HashMap<(String, String, String), Vec<String>>,
}

/// HashMap-backed [`StorageBackend`].
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageBackend for MemoryBackend {
    fn put(&self, kind: RecordKind, id: &str, record: &Value) -> Result<bool> {
        let mut state = self.state.lock().expect("memory backend poisoned");
        let records = state.records.entry(kind.as_str()).or_default();
        if records.iter().any(|(existing, _)| existing == id) {
            return Ok(false);
        }
        records.push((id.to_string(), record.clone()));
        Ok(true)
    }

    fn update(&self, kind: RecordKind, id: &str, record: &Value) -> Result<bool> {
        let mut state = self.state.lock().expect("memory backend poisoned");
        if let Some(records) = state.records.get_mut(kind.as_str()) {
            if let Some(slot) = records.iter_mut().find(|(existing, _)| existing == id) {
                slot.1 = record.clone();
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Value>> {
        let state = self.state.lock().expect("memory backend poisoned");
        Ok(state
            .records
            .get(kind.as_str())
            .and_then(|records| {
                records
                    .iter()
                    .find(|(existing, _)| existing == id)
                    .map(|(_, record)| record.clone())
            }))
    }

    fn iter(&self, kind: RecordKind) -> Result<Vec<(String, Value)>> {
        let state = self.state.lock().expect("memory backend poisoned");
        Ok(state
            .records
            .get(kind.as_str())
            .cloned()
            .unwrap_or_default())
    }

    fn delete_by_agent(&self, agent_id: &str) -> Result<usize> {
        let mut state = self.state.lock().expect("memory backend poisoned");
        let mut removed = 0;
        for records in state.records.values_mut() {
            let before = records.len();
            records.retain(|(_, record)| !record_mentions_agent(record, agent_id));
            removed += before - records.len();
        }
        Ok(removed)
    }

    fn index_add(&self, kind: RecordKind, index_name: &str, key: &str, id: &str) -> Result<()> {
        let mut state = self.state.lock().expect("memory backend poisoned");
        let ids = state
            .indexes
            .entry((
                kind.as_str().to_string(),
                index_name.to_string(),
                key.to_string(),
            ))
            .or_default();
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
        Ok(())
    }

    fn index_lookup(&self, kind: RecordKind, index_name: &str, key: &str) -> Result<Vec<String>> {
        let state = self.state.lock().expect("memory backend poisoned");
        let ids = state
            .indexes
            .get(&(
                kind.as_str().to_string(),
                index_name.to_string(),
                key.to_string(),
            ))
            .cloned()
            .unwrap_or_default();

        // Never surface ids whose records were erased.
        let live = state.records.get(kind.as_str());
        Ok(ids
            .into_iter()
            .filter(|id| {
                live.map(|records| records.iter().any(|(existing, _)| existing == id))
                    .unwrap_or(false)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_is_idempotent() {
        let backend = MemoryBackend::new();
        let record = json!({"subject": "agent:a", "task": "qa"});

        assert!(backend.put(RecordKind::Attestation, "id-1", &record).unwrap());
        assert!(!backend.put(RecordKind::Attestation, "id-1", &record).unwrap());
        assert_eq!(backend.iter(RecordKind::Attestation).unwrap().len(), 1);
    }

    #[test]
    fn test_get_and_iter_order() {
        let backend = MemoryBackend::new();
        backend
            .put(RecordKind::Attestation, "a", &json!({"n": 1}))
            .unwrap();
        backend
            .put(RecordKind::Attestation, "b", &json!({"n": 2}))
            .unwrap();

        assert_eq!(
            backend.get(RecordKind::Attestation, "a").unwrap().unwrap()["n"],
            1
        );
        assert!(backend.get(RecordKind::Attestation, "zzz").unwrap().is_none());

        let all = backend.iter(RecordKind::Attestation).unwrap();
        assert_eq!(all[0].0, "a");
        assert_eq!(all[1].0, "b");
    }

    #[test]
    fn test_update_in_place() {
        let backend = MemoryBackend::new();
        backend
            .put(RecordKind::PlatformDatum, "p1", &json!({"n": 1}))
            .unwrap();

        assert!(backend.update(RecordKind::PlatformDatum, "p1", &json!({"n": 2})).unwrap());
        assert!(!backend.update(RecordKind::PlatformDatum, "p2", &json!({})).unwrap());
        assert_eq!(
            backend.get(RecordKind::PlatformDatum, "p1").unwrap().unwrap()["n"],
            2
        );
        assert_eq!(backend.iter(RecordKind::PlatformDatum).unwrap().len(), 1);
    }

    #[test]
    fn test_kinds_are_separate() {
        let backend = MemoryBackend::new();
        backend
            .put(RecordKind::Attestation, "shared-id", &json!({"kind": "att"}))
            .unwrap();
        backend
            .put(RecordKind::Revocation, "shared-id", &json!({"kind": "rev"}))
            .unwrap();

        assert_eq!(
            backend.get(RecordKind::Revocation, "shared-id").unwrap().unwrap()["kind"],
            "rev"
        );
    }

    #[test]
    fn test_delete_by_agent() {
        let backend = MemoryBackend::new();
        backend
            .put(
                RecordKind::Attestation,
                "a1",
                &json!({"subject": "agent:gone", "witness": "agent:w"}),
            )
            .unwrap();
        backend
            .put(
                RecordKind::Attestation,
                "a2",
                &json!({"subject": "agent:other", "witness": "agent:gone"}),
            )
            .unwrap();
        backend
            .put(
                RecordKind::Delegation,
                "d1",
                &json!({"principal": "agent:gone", "delegate": "agent:x"}),
            )
            .unwrap();
        backend
            .put(
                RecordKind::Attestation,
                "keep",
                &json!({"subject": "agent:other", "witness": "agent:w"}),
            )
            .unwrap();

        let removed = backend.delete_by_agent("agent:gone").unwrap();
        assert_eq!(removed, 3);
        assert_eq!(backend.iter(RecordKind::Attestation).unwrap().len(), 1);
        assert!(backend.iter(RecordKind::Delegation).unwrap().is_empty());
    }

    #[test]
    fn test_index_lookup_filters_erased() {
        let backend = MemoryBackend::new();
        backend
            .put(RecordKind::Attestation, "a1", &json!({"subject": "agent:s"}))
            .unwrap();
        backend
            .index_add(RecordKind::Attestation, "by_subject", "agent:s", "a1")
            .unwrap();

        assert_eq!(
            backend
                .index_lookup(RecordKind::Attestation, "by_subject", "agent:s")
                .unwrap(),
            vec!["a1"]
        );

        backend.delete_by_agent("agent:s").unwrap();
        assert!(backend
            .index_lookup(RecordKind::Attestation, "by_subject", "agent:s")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_index_add_dedupes() {
        let backend = MemoryBackend::new();
        backend
            .put(RecordKind::Attestation, "a1", &json!({}))
            .unwrap();
        backend
            .index_add(RecordKind::Attestation, "by_task", "qa", "a1")
            .unwrap();
        backend
            .index_add(RecordKind::Attestation, "by_task", "qa", "a1")
            .unwrap();
        assert_eq!(
            backend
                .index_lookup(RecordKind::Attestation, "by_task", "qa")
                .unwrap()
                .len(),
            1
        );
    }
}
