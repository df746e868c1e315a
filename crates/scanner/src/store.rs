//! Persistence for scan results.
//!
//! One [`PlatformDatum`] per (agent, platform URL): created on first scan,
//! updated in place on later scans, erased with the agent.

use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use isnad_crypto::content_id;
use isnad_domain::{ConnectorResult, PlatformDatum};
use isnad_storage::{RecordKind, StorageBackend};

/// Store for per-agent platform data over any backend.
#[derive(Clone)]
pub struct PlatformStore {
    backend: Arc<dyn StorageBackend>,
}

impl PlatformStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    fn datum_id(agent_id: &str, url: &str) -> String {
        content_id(format!("{}|{}", agent_id, url).as_bytes())
    }

    /// Insert or update the datum for this agent and URL.
    pub fn upsert(
        &self,
        agent_id: &str,
        platform_name: &str,
        result: &ConnectorResult,
    ) -> Result<PlatformDatum> {
        let id = Self::datum_id(agent_id, &result.url);

        let datum = match self.backend.get(RecordKind::PlatformDatum, &id)? {
            Some(existing) => {
                let mut datum: PlatformDatum = serde_json::from_value(existing)?;
                datum.update_from(result);
                self.backend
                    .update(RecordKind::PlatformDatum, &id, &serde_json::to_value(&datum)?)?;
                debug!(agent_id = %agent_id, url = %result.url, "Platform datum updated");
                datum
            }
            None => {
                let datum = PlatformDatum::from_result(agent_id, platform_name, result);
                self.backend
                    .put(RecordKind::PlatformDatum, &id, &serde_json::to_value(&datum)?)?;
                self.backend
                    .index_add(RecordKind::PlatformDatum, "by_agent", agent_id, &id)?;
                debug!(agent_id = %agent_id, url = %result.url, "Platform datum created");
                datum
            }
        };
        Ok(datum)
    }

    /// All platform data for an agent.
    pub fn for_agent(&self, agent_id: &str) -> Result<Vec<PlatformDatum>> {
        let ids = self
            .backend
            .index_lookup(RecordKind::PlatformDatum, "by_agent", agent_id)?;
        let mut data = Vec::new();
        for id in ids {
            if let Some(record) = self.backend.get(RecordKind::PlatformDatum, &id)? {
                if let Ok(datum) = serde_json::from_value::<PlatformDatum>(record) {
                    data.push(datum);
                }
            }
        }
        Ok(data)
    }
}
