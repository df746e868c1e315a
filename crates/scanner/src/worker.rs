//! The scan supervisor.
//!
//! One background task runs the cycle loop; inside a cycle agents are
//! visited sequentially, each outbound fetch gated by the token bucket and
//! bounded by a deadline. `stop()` cancels the loop at its next await
//! point. A failed connector or a failed store write is logged and the
//! cycle continues — one agent's problem never starves the rest.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::connectors::ConnectorRegistry;
use crate::error::{Result, ScannerError};
use crate::limiter::TokenBucket;
use crate::store::PlatformStore;
use isnad_domain::ConnectorResult;

/// Default seconds between scan cycles.
pub const DEFAULT_INTERVAL_SECS: u64 = 3600;

/// Default outbound requests per second.
pub const DEFAULT_RATE_LIMIT_RPS: f64 = 5.0;

/// Default per-fetch deadline.
pub const DEFAULT_FETCH_DEADLINE: Duration = Duration::from_secs(15);

/// Scanner configuration, environment-overridable.
#[derive(Debug, Clone)]
pub struct ScannerConfig {
    pub interval: Duration,
    pub rate_limit_rps: f64,
    pub fetch_deadline: Duration,
}

impl ScannerConfig {
    /// Read `WORKER_INTERVAL` (seconds) and `RATE_LIMIT_RPS`, falling back
    /// to defaults on absent or unparseable values.
    pub fn from_env() -> Self {
        let interval = std::env::var("WORKER_INTERVAL")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_INTERVAL_SECS);
        let rate_limit_rps = std::env::var("RATE_LIMIT_RPS")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(DEFAULT_RATE_LIMIT_RPS);
        Self {
            interval: Duration::from_secs(interval),
            rate_limit_rps,
            fetch_deadline: DEFAULT_FETCH_DEADLINE,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            rate_limit_rps: DEFAULT_RATE_LIMIT_RPS,
            fetch_deadline: DEFAULT_FETCH_DEADLINE,
        }
    }
}

/// A platform an agent has declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformRef {
    pub name: String,
    pub url: String,
}

/// Source of agents and their declared platforms.
pub trait PlatformDirectory: Send + Sync {
    /// Every agent with its declared platforms.
    fn agents(&self) -> Vec<(String, Vec<PlatformRef>)>;

    /// One agent's declared platforms, None when unknown.
    fn platforms_for(&self, agent_id: &str) -> Option<Vec<PlatformRef>>;
}

/// Mutex-guarded in-memory directory.
#[derive(Default)]
pub struct InMemoryDirectory {
    entries: Mutex<Vec<(String, Vec<PlatformRef>)>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_platform(&self, agent_id: &str, name: &str, url: &str) {
        let mut entries = self.entries.lock().expect("directory poisoned");
        let platform = PlatformRef {
            name: name.to_string(),
            url: url.to_string(),
        };
        match entries.iter_mut().find(|(id, _)| id == agent_id) {
            Some((_, platforms)) => {
                if !platforms.iter().any(|p| p.url == platform.url) {
                    platforms.push(platform);
                }
            }
            None => entries.push((agent_id.to_string(), vec![platform])),
        }
    }

    pub fn remove_agent(&self, agent_id: &str) {
        self.entries
            .lock()
            .expect("directory poisoned")
            .retain(|(id, _)| id != agent_id);
    }
}

impl PlatformDirectory for InMemoryDirectory {
    fn agents(&self) -> Vec<(String, Vec<PlatformRef>)> {
        self.entries.lock().expect("directory poisoned").clone()
    }

    fn platforms_for(&self, agent_id: &str) -> Option<Vec<PlatformRef>> {
        self.entries
            .lock()
            .expect("directory poisoned")
            .iter()
            .find(|(id, _)| id == agent_id)
            .map(|(_, platforms)| platforms.clone())
    }
}

/// Background worker that scans agent platforms and stores results.
pub struct PlatformWorker {
    directory: Arc<dyn PlatformDirectory>,
    store: PlatformStore,
    registry: ConnectorRegistry,
    limiter: TokenBucket,
    config: ScannerConfig,
    running: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PlatformWorker {
    pub fn new(
        directory: Arc<dyn PlatformDirectory>,
        store: PlatformStore,
        config: ScannerConfig,
    ) -> Self {
        Self {
            directory,
            store,
            registry: ConnectorRegistry::new(),
            limiter: TokenBucket::new(config.rate_limit_rps),
            config,
            running: Arc::new(AtomicBool::new(false)),
            task: Mutex::new(None),
        }
    }

    /// Replace the connector registry (tests install stubs here).
    pub fn with_registry(mut self, registry: ConnectorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the periodic scan loop.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let worker = self.clone();
        let handle = tokio::spawn(async move {
            info!(
                interval_secs = worker.config.interval.as_secs(),
                rate_limit_rps = worker.config.rate_limit_rps,
                "Platform worker started"
            );
            while worker.running.load(Ordering::SeqCst) {
                let scanned = worker.scan_all().await;
                debug!(scanned = scanned, "Scan cycle complete");
                tokio::time::sleep(worker.config.interval).await;
            }
        });
        *self.task.lock().expect("worker poisoned") = Some(handle);
    }

    /// Stop the loop, cancelling the in-flight cycle at its next await.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.task.lock().expect("worker poisoned").take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
        info!("Platform worker stopped");
    }

    /// Scan every agent's platforms once. Returns how many were scanned.
    pub async fn scan_all(&self) -> usize {
        info!("Starting platform scan cycle");
        let mut count = 0usize;

        for (agent_id, platforms) in self.directory.agents() {
            for platform in platforms {
                if platform.url.is_empty() {
                    continue;
                }
                let result = self.fetch_with_limits(&platform.url).await;
                match self.store.upsert(&agent_id, &platform.name, &result) {
                    Ok(_) => {
                        count += 1;
                        debug!(
                            agent_id = %agent_id,
                            url = %platform.url,
                            alive = result.alive,
                            "Platform scanned"
                        );
                    }
                    // One datum failing to persist must not abort the cycle.
                    Err(e) => {
                        error!(agent_id = %agent_id, url = %platform.url, error = %e, "Failed to store scan result")
                    }
                }
            }
        }

        info!(count = count, "Platform scan cycle complete");
        count
    }

    /// Scan a single agent's platforms (manual trigger).
    pub async fn scan_agent(&self, agent_id: &str) -> Result<Vec<ConnectorResult>> {
        let platforms = self
            .directory
            .platforms_for(agent_id)
            .ok_or_else(|| ScannerError::AgentNotFound(agent_id.to_string()))?;

        let mut results = Vec::new();
        for platform in platforms {
            if platform.url.is_empty() {
                continue;
            }
            let result = self.fetch_with_limits(&platform.url).await;
            self.store.upsert(agent_id, &platform.name, &result)?;
            results.push(result);
        }
        Ok(results)
    }

    /// Stored platform data for an agent.
    pub fn platform_data(&self, agent_id: &str) -> Result<Vec<isnad_domain::PlatformDatum>> {
        self.store.for_agent(agent_id)
    }

    /// Rate-limited, deadline-bounded fetch. A deadline overrun is a dead
    /// result, not an error.
    async fn fetch_with_limits(&self, url: &str) -> ConnectorResult {
        self.limiter.acquire().await;
        let connector = self.registry.resolve(url);
        match timeout(self.config.fetch_deadline, connector.fetch(url)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url = %url, deadline = ?self.config.fetch_deadline, "Connector deadline exceeded");
                ConnectorResult::dead(connector.platform_name(), url, "deadline exceeded")
            }
        }
    }
}
