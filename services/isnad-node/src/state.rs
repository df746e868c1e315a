use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use isnad_events::EventBus;
use isnad_ledger::{DelegationRegistry, DiscoveryRegistry, TrustLedger};
use isnad_monitor::TrustHealthMonitor;
use isnad_policy::TrustPolicy;
use isnad_scanner::{InMemoryDirectory, PlatformStore, PlatformWorker};
use isnad_storage::{JsonlBackend, MemoryBackend, SqliteBackend, StorageBackend};

use crate::config::Config;

/// Shared application state threaded through every handler.
pub struct AppState {
    pub config: Config,
    pub backend: Arc<dyn StorageBackend>,
    pub ledger: RwLock<TrustLedger>,
    pub delegations: RwLock<DelegationRegistry>,
    pub discovery: RwLock<DiscoveryRegistry>,
    pub policies: RwLock<HashMap<String, TrustPolicy>>,
    pub bus: EventBus,
    pub monitor: TrustHealthMonitor,
    pub directory: Arc<InMemoryDirectory>,
    pub worker: Arc<PlatformWorker>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, Box<dyn std::error::Error>> {
        let backend: Arc<dyn StorageBackend> = if config.db_path.is_empty() {
            Arc::new(MemoryBackend::new())
        } else if config.db_path.ends_with(".jsonl") {
            Arc::new(JsonlBackend::open(&config.db_path)?)
        } else {
            Arc::new(SqliteBackend::open(&config.db_path)?)
        };

        let ledger = TrustLedger::new(backend.clone())?;
        let delegations = DelegationRegistry::new(backend.clone())?;

        let directory = Arc::new(InMemoryDirectory::new());
        let worker = Arc::new(PlatformWorker::new(
            directory.clone(),
            PlatformStore::new(backend.clone()),
            config.scanner.clone(),
        ));

        Ok(AppState {
            config,
            backend,
            ledger: RwLock::new(ledger),
            delegations: RwLock::new(delegations),
            discovery: RwLock::new(DiscoveryRegistry::new()),
            policies: RwLock::new(HashMap::new()),
            bus: EventBus::new(),
            monitor: TrustHealthMonitor::new(3600.0),
            directory,
            worker,
        })
    }
}
