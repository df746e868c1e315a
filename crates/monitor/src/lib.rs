//! Trust network health monitoring
//!
//! Real-time observability over ledger operations:
//! - [`SlidingWindow`] — time-bounded event buffer, pruned on read
//! - [`AnomalyDetector`] — rule-based alerts (revocation spikes, low
//!   scores, failure and latency anomalies, mass revocation)
//! - [`TrustHealthMonitor`] — the recording hub with a composite health
//!   score
//! - [`MetricsExporter`] — Prometheus text exposition
//!
//! Recording is mutex-guarded and cheap; detection runs on demand over the
//! current window.

pub mod anomaly;
pub mod exporter;
pub mod window;

pub use anomaly::{AnomalyAlert, AnomalyDetector, Severity};
pub use exporter::MetricsExporter;
pub use window::{EventType, MetricEvent, SlidingWindow};

use serde_json::{json, Value};
use std::sync::Mutex;

/// Central monitoring hub for trust network health.
pub struct TrustHealthMonitor {
    window: SlidingWindow,
    detector: AnomalyDetector,
    total_events: Mutex<u64>,
}

impl TrustHealthMonitor {
    pub fn new(window_seconds: f64) -> Self {
        Self::with_detector(window_seconds, AnomalyDetector::default())
    }

    pub fn with_detector(window_seconds: f64, detector: AnomalyDetector) -> Self {
        Self {
            window: SlidingWindow::new(window_seconds),
            detector,
            total_events: Mutex::new(0),
        }
    }

    pub fn window(&self) -> &SlidingWindow {
        &self.window
    }

    pub fn record_attestation(&self, agent_id: &str, target_id: &str, score: f64, latency_ms: Option<f64>) {
        self.record(MetricEvent::new(EventType::Attestation, agent_id)
            .target(target_id)
            .score(score)
            .latency(latency_ms));
    }

    pub fn record_revocation(&self, agent_id: &str, target_id: &str, latency_ms: Option<f64>) {
        self.record(MetricEvent::new(EventType::Revocation, agent_id)
            .target(target_id)
            .latency(latency_ms));
    }

    pub fn record_delegation(&self, agent_id: &str, delegate_id: &str, latency_ms: Option<f64>) {
        self.record(MetricEvent::new(EventType::Delegation, agent_id)
            .target(delegate_id)
            .latency(latency_ms));
    }

    pub fn record_verification(&self, agent_id: &str, target_id: &str, valid: bool, latency_ms: Option<f64>) {
        self.record(
            MetricEvent::new(EventType::Verification, agent_id)
                .target(target_id)
                .success(valid)
                .latency(latency_ms),
        );
    }

    pub fn record_scan(&self, agent_id: &str, platform: &str, alive: bool, latency_ms: Option<f64>) {
        self.record(
            MetricEvent::new(EventType::PlatformScan, agent_id)
                .target(platform)
                .success(alive)
                .latency(latency_ms),
        );
    }

    pub fn record(&self, event: MetricEvent) {
        self.window.add(event);
        *self.total_events.lock().expect("monitor poisoned") += 1;
    }

    pub fn total_events(&self) -> u64 {
        *self.total_events.lock().expect("monitor poisoned")
    }

    /// Current anomaly alerts.
    pub fn anomalies(&self) -> Vec<AnomalyAlert> {
        self.detector.analyze(&self.window)
    }

    /// Composite health score in [0, 1]: 1.0 minus weighted penalties for
    /// failure rate, revocation pressure, and active anomalies.
    pub fn health_score(&self) -> f64 {
        let events = self.window.events(None);
        let mut score: f64 = 1.0;

        if !events.is_empty() {
            let failures = events.iter().filter(|e| !e.success).count();
            score -= failures as f64 / events.len() as f64 * 0.5;
        }

        let attestations = events
            .iter()
            .filter(|e| e.event_type == EventType::Attestation)
            .count();
        let revocations = events
            .iter()
            .filter(|e| e.event_type == EventType::Revocation)
            .count();
        if attestations > 0 && revocations > 0 {
            let ratio = revocations as f64 / attestations.max(1) as f64;
            score -= (ratio * 0.1).min(0.3);
        }

        for alert in self.anomalies() {
            score -= alert.severity.penalty();
        }

        score.clamp(0.0, 1.0)
    }

    /// Full health report as JSON.
    pub fn health_report(&self) -> Value {
        let events = self.window.events(None);
        let attestations = self.window.count(Some(EventType::Attestation));
        let revocations = self.window.count(Some(EventType::Revocation));
        let verifications = self.window.count(Some(EventType::Verification));
        let anomalies = self.anomalies();

        let mut latencies: Vec<f64> = events.iter().filter_map(|e| e.latency_ms).collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).expect("latencies are finite"));
        let latency = if latencies.is_empty() {
            json!({})
        } else {
            let p50 = median(&latencies);
            let p95 = if latencies.len() >= 20 {
                latencies[(latencies.len() as f64 * 0.95) as usize]
            } else {
                *latencies.last().expect("non-empty")
            };
            let mean = latencies.iter().sum::<f64>() / latencies.len() as f64;
            json!({"p50_ms": p50, "p95_ms": p95, "mean_ms": mean})
        };

        let mut agents: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
        for event in &events {
            agents.insert(event.agent_id.clone());
            if let Some(target) = &event.target_id {
                agents.insert(target.clone());
            }
        }

        json!({
            "score": self.health_score(),
            "window_seconds": self.window.window_seconds(),
            "total_events": events.len(),
            "total_events_all_time": self.total_events(),
            "attestations": attestations,
            "revocations": revocations,
            "verifications": verifications,
            "attestation_rate_per_min": self.window.rate_per_minute(Some(EventType::Attestation)),
            "active_agents": agents.len(),
            "latency": latency,
            "anomalies": anomalies.iter().map(|a| json!({
                "type": a.alert_type,
                "severity": a.severity,
                "message": a.message,
            })).collect::<Vec<_>>(),
        })
    }
}

pub(crate) fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
