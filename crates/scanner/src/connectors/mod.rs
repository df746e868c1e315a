//! Platform connectors.
//!
//! Each connector fetches one platform's public signals and normalizes
//! them into a [`ConnectorResult`]. The contract: `fetch` always returns a
//! result — an unreachable or unparseable platform yields `alive = false`
//! with the error recorded in `raw_data`, never an error or panic.

pub mod generic;
pub mod github;
pub mod ugig;

use async_trait::async_trait;
use std::sync::Arc;

use isnad_domain::ConnectorResult;

pub use generic::GenericConnector;
pub use github::GitHubConnector;
pub use ugig::UgigConnector;

/// The connector contract.
#[async_trait]
pub trait Connector: Send + Sync {
    fn platform_name(&self) -> &'static str;

    /// Fetch platform data for a URL. Must not fail: error conditions are
    /// reported inside the returned result.
    async fn fetch(&self, url: &str) -> ConnectorResult;
}

/// Maps URL substrings to connectors, with a generic fallback that does
/// plain liveness checking.
pub struct ConnectorRegistry {
    entries: Vec<(String, Arc<dyn Connector>)>,
    fallback: Arc<dyn Connector>,
}

impl ConnectorRegistry {
    /// Registry with the built-in connectors.
    pub fn new() -> Self {
        Self {
            entries: vec![
                ("github.com".to_string(), Arc::new(GitHubConnector::new()) as Arc<dyn Connector>),
                ("ugig.net".to_string(), Arc::new(UgigConnector::new()) as Arc<dyn Connector>),
            ],
            fallback: Arc::new(GenericConnector::new()),
        }
    }

    /// Empty registry with only the fallback; used by tests to install
    /// stub connectors.
    pub fn with_fallback(fallback: Arc<dyn Connector>) -> Self {
        Self {
            entries: Vec::new(),
            fallback,
        }
    }

    pub fn register(&mut self, url_pattern: &str, connector: Arc<dyn Connector>) {
        self.entries.push((url_pattern.to_string(), connector));
    }

    /// The connector responsible for a URL.
    pub fn resolve(&self, url: &str) -> Arc<dyn Connector> {
        let url_lower = url.to_lowercase();
        for (pattern, connector) in &self.entries {
            if url_lower.contains(pattern) {
                return connector.clone();
            }
        }
        self.fallback.clone()
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract the path segment following `host/` in a URL, stopping at the
/// next separator. Used by connectors that key on a username.
pub(crate) fn username_after(url: &str, host_marker: &str) -> Option<String> {
    let start = url.find(host_marker)? + host_marker.len();
    let rest = &url[start..];
    let name: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
