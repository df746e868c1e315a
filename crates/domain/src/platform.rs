//! Platform data records produced by the scanner.
//!
//! Connectors normalize whatever an external platform exposes into a small
//! fixed metric set. Scores are 0-100; absence of positive signal means a
//! reputation of 0 — "not failing" is not trust.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// External verification level observed on a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum VerificationLevel {
    #[default]
    None,
    Basic,
    Verified,
}

/// Normalized per-platform metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ConnectorMetrics {
    /// 0-100, decays with days since last observed activity.
    pub activity_score: u8,
    /// 0-100, zero when no positive signal exists.
    pub reputation_score: u8,
    /// Days since account creation.
    pub longevity_days: u32,
    pub verification_level: VerificationLevel,
    /// Count of independently observable pieces of evidence.
    pub evidence_count: u32,
}

/// What a connector returns for one URL. Always a value, never an error:
/// failures come back as `alive = false` with the error in `raw_data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorResult {
    pub platform: String,
    pub url: String,
    pub alive: bool,
    pub raw_data: Value,
    pub metrics: ConnectorMetrics,
}

impl ConnectorResult {
    /// Result for an unreachable or unparseable platform.
    pub fn dead(platform: &str, url: &str, error: &str) -> Self {
        let raw_data = if error.is_empty() {
            serde_json::json!({})
        } else {
            serde_json::json!({ "error": error })
        };
        Self {
            platform: platform.to_string(),
            url: url.to_string(),
            alive: false,
            raw_data,
            metrics: ConnectorMetrics::default(),
        }
    }
}

/// Persisted per-agent, per-platform scan record.
///
/// Created on first scan of a URL, updated in place on later scans, removed
/// with the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformDatum {
    pub agent_id: String,
    pub platform_name: String,
    pub platform_url: String,
    pub raw_data: Value,
    pub metrics: ConnectorMetrics,
    /// RFC 3339, updated on every scan.
    pub last_fetched: String,
}

impl PlatformDatum {
    /// Build a datum from a fresh connector result.
    pub fn from_result(agent_id: &str, platform_name: &str, result: &ConnectorResult) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            platform_name: platform_name.to_string(),
            platform_url: result.url.clone(),
            raw_data: result.raw_data.clone(),
            metrics: result.metrics.clone(),
            last_fetched: Utc::now().to_rfc3339(),
        }
    }

    /// Apply a newer scan of the same URL.
    pub fn update_from(&mut self, result: &ConnectorResult) {
        self.raw_data = result.raw_data.clone();
        self.metrics = result.metrics.clone();
        self.last_fetched = Utc::now().to_rfc3339();
    }
}
