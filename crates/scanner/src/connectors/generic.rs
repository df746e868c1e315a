//! Generic fallback connector.
//!
//! For platforms with no dedicated connector: an HTTP liveness probe plus
//! TLS evidence. Scores stay low on purpose — a page that merely responds
//! proves presence, not reputation.

use async_trait::async_trait;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::warn;

use super::Connector;
use isnad_domain::{ConnectorMetrics, ConnectorResult, VerificationLevel};

pub struct GenericConnector {
    client: reqwest::Client,
}

impl GenericConnector {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .user_agent("isnad-scanner")
                .build()
                .expect("reqwest client"),
        }
    }
}

impl Default for GenericConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for GenericConnector {
    fn platform_name(&self) -> &'static str {
        "generic"
    }

    async fn fetch(&self, url: &str) -> ConnectorResult {
        let started = Instant::now();
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %url, error = %e, "Generic fetch failed");
                return ConnectorResult::dead("generic", url, &e.to_string());
            }
        };

        let status = response.status().as_u16();
        let alive = status < 500;
        let response_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response.text().await.unwrap_or_default();
        let head = body.get(..5000.min(body.len())).unwrap_or("").to_lowercase();

        // The TLS handshake already validated the chain, so a successful
        // HTTPS response is itself certificate evidence.
        let tls_valid = alive && url.to_lowercase().starts_with("https://");

        let mut raw_data = json!({
            "status_code": status,
            "response_time_ms": (response_time_ms * 10.0).round() / 10.0,
            "content_length": body.len(),
            "content_type": content_type,
            "has_title": head.contains("<title"),
            "has_meta_description": head.contains("name=\"description\""),
        });
        if tls_valid {
            raw_data["ssl"] = json!({"valid": true});
        }

        // Alive is minimal evidence; a valid certificate adds a little.
        let mut activity_score: u8 = if alive { 10 } else { 0 };
        let verification_level = if tls_valid {
            activity_score = (activity_score + 5).min(100);
            VerificationLevel::Basic
        } else {
            VerificationLevel::None
        };

        let mut evidence_count = u32::from(alive);
        if tls_valid {
            evidence_count += 1;
        }

        ConnectorResult {
            platform: "generic".to_string(),
            url: url.to_string(),
            alive,
            raw_data,
            metrics: ConnectorMetrics {
                activity_score,
                reputation_score: 0,
                longevity_days: 0,
                verification_level,
                evidence_count,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_host_is_dead() {
        let connector = GenericConnector::new();
        let result = connector.fetch("http://127.0.0.1:1/nothing-here").await;

        assert!(!result.alive);
        assert_eq!(result.metrics.activity_score, 0);
        assert_eq!(result.metrics.reputation_score, 0);
        assert_eq!(result.metrics.verification_level, VerificationLevel::None);
        assert!(result.raw_data["error"].is_string());
    }
}
