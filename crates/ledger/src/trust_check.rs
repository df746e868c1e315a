//! Trust-check history.
//!
//! Every scoring request the service answers is recorded so an agent's
//! reputation trajectory can be audited later.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use isnad_storage::{RecordKind, StorageBackend};

/// One recorded scoring request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrustCheck {
    pub check_id: String,
    pub agent_id: String,
    pub score: f64,
    #[serde(default)]
    pub scope: Option<String>,
    pub requested_at: String,
}

impl TrustCheck {
    pub fn new(agent_id: &str, score: f64, scope: Option<String>) -> Self {
        Self {
            check_id: Uuid::new_v4().simple().to_string(),
            agent_id: agent_id.to_string(),
            score,
            scope,
            requested_at: Utc::now().to_rfc3339(),
        }
    }

    /// Persist the check and index it per agent.
    pub fn record(&self, backend: &Arc<dyn StorageBackend>) -> Result<()> {
        let record = serde_json::to_value(self)?;
        backend.put(RecordKind::TrustCheck, &self.check_id, &record)?;
        backend.index_add(RecordKind::TrustCheck, "by_agent", &self.agent_id, &self.check_id)?;
        Ok(())
    }

    /// Most recent checks for an agent, newest last, capped at `limit`.
    pub fn history(
        backend: &Arc<dyn StorageBackend>,
        agent_id: &str,
        limit: usize,
    ) -> Result<Vec<TrustCheck>> {
        let ids = backend.index_lookup(RecordKind::TrustCheck, "by_agent", agent_id)?;
        let mut checks = Vec::new();
        for id in ids {
            if let Some(record) = backend.get(RecordKind::TrustCheck, &id)? {
                if let Ok(check) = serde_json::from_value::<TrustCheck>(record) {
                    checks.push(check);
                }
            }
        }
        let skip = checks.len().saturating_sub(limit);
        Ok(checks.split_off(skip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isnad_storage::MemoryBackend;

    #[test]
    fn test_record_and_history() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());

        for i in 0..5 {
            TrustCheck::new("agent:a", 0.1 * i as f64, None)
                .record(&backend)
                .unwrap();
        }
        TrustCheck::new("agent:b", 0.9, Some("trade".into()))
            .record(&backend)
            .unwrap();

        let history = TrustCheck::history(&backend, "agent:a", 10).unwrap();
        assert_eq!(history.len(), 5);
        assert!(history.iter().all(|c| c.agent_id == "agent:a"));

        let capped = TrustCheck::history(&backend, "agent:a", 2).unwrap();
        assert_eq!(capped.len(), 2);
        // Newest retained when capped.
        assert!((capped[1].score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_empty_history() {
        let backend: Arc<dyn StorageBackend> = Arc::new(MemoryBackend::new());
        assert!(TrustCheck::history(&backend, "agent:none", 10).unwrap().is_empty());
    }
}
