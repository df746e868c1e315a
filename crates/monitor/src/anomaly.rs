//! Rule-based anomaly detection over the sliding window.

use serde::{Deserialize, Serialize};

use crate::median;
use crate::window::{now, EventType, SlidingWindow};

/// Alert severity, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Health-score penalty this severity carries.
    pub fn penalty(&self) -> f64 {
        match self {
            Severity::Low => 0.02,
            Severity::Medium => 0.05,
            Severity::High => 0.1,
            Severity::Critical => 0.2,
        }
    }
}

/// A detected anomaly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyAlert {
    pub alert_type: String,
    pub severity: Severity,
    pub message: String,
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
}

/// Threshold-driven detector. Thresholds are tuned for a one-hour window;
/// all are overridable.
pub struct AnomalyDetector {
    /// Revocations-to-attestations ratio that counts as a spike.
    pub revocation_spike_threshold: f64,
    /// Average attestation score below this is alarming.
    pub low_score_threshold: f64,
    /// Failure fraction above this is alarming (needs >= 10 events).
    pub high_failure_rate: f64,
    /// Recent-median-to-baseline latency multiple that counts as a spike.
    pub latency_spike_factor: f64,
    /// Revocations by one agent in the window that count as mass revocation.
    pub mass_revocation_count: usize,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self {
            revocation_spike_threshold: 3.0,
            low_score_threshold: 0.3,
            high_failure_rate: 0.25,
            latency_spike_factor: 5.0,
            mass_revocation_count: 5,
        }
    }
}

impl AnomalyDetector {
    /// Run every rule over the current window.
    pub fn analyze(&self, window: &SlidingWindow) -> Vec<AnomalyAlert> {
        let mut alerts = Vec::new();
        let ts = now();

        let attestations = window.events(Some(EventType::Attestation));
        let revocations = window.events(Some(EventType::Revocation));
        let all_events = window.events(None);

        // 1. Revocation spike relative to attestation volume.
        if !attestations.is_empty() && !revocations.is_empty() {
            let ratio = revocations.len() as f64 / attestations.len().max(1) as f64;
            if ratio > self.revocation_spike_threshold {
                alerts.push(AnomalyAlert {
                    alert_type: "revocation_spike".into(),
                    severity: Severity::High,
                    message: format!(
                        "Revocation rate {:.1}x higher than attestation rate",
                        ratio
                    ),
                    timestamp: ts,
                    agent_id: None,
                });
            }
        }

        // 2. Average attestation score critically low.
        let scored: Vec<f64> = attestations.iter().filter_map(|e| e.score).collect();
        if !scored.is_empty() {
            let avg = scored.iter().sum::<f64>() / scored.len() as f64;
            if avg < self.low_score_threshold {
                alerts.push(AnomalyAlert {
                    alert_type: "low_avg_trust".into(),
                    severity: Severity::Medium,
                    message: format!("Average trust score critically low: {:.2}", avg),
                    timestamp: ts,
                    agent_id: None,
                });
            }
        }

        // 3. High operation failure rate, once there is enough signal.
        if all_events.len() >= 10 {
            let failures = all_events.iter().filter(|e| !e.success).count();
            let fail_rate = failures as f64 / all_events.len() as f64;
            if fail_rate > self.high_failure_rate {
                alerts.push(AnomalyAlert {
                    alert_type: "high_failure_rate".into(),
                    severity: Severity::High,
                    message: format!("Operation failure rate: {:.0}%", fail_rate * 100.0),
                    timestamp: ts,
                    agent_id: None,
                });
            }
        }

        // 4. Recent latency spiking over the window baseline.
        let timed: Vec<f64> = all_events.iter().filter_map(|e| e.latency_ms).collect();
        if timed.len() >= 5 {
            let mut sorted = timed.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).expect("latencies are finite"));
            let baseline = median(&sorted);
            if baseline > 0.0 {
                let mut recent: Vec<f64> = timed[timed.len() - 5..].to_vec();
                recent.sort_by(|a, b| a.partial_cmp(b).expect("latencies are finite"));
                let recent_median = median(&recent);
                if recent_median > baseline * self.latency_spike_factor {
                    alerts.push(AnomalyAlert {
                        alert_type: "latency_spike".into(),
                        severity: Severity::Medium,
                        message: format!(
                            "Latency spike detected: {:.0}ms vs {:.0}ms baseline",
                            recent_median, baseline
                        ),
                        timestamp: ts,
                        agent_id: None,
                    });
                }
            }
        }

        // 5. One agent revoking en masse.
        let mut per_agent: std::collections::BTreeMap<&str, usize> =
            std::collections::BTreeMap::new();
        for event in &revocations {
            *per_agent.entry(event.agent_id.as_str()).or_default() += 1;
        }
        for (agent, count) in per_agent {
            if count >= self.mass_revocation_count {
                alerts.push(AnomalyAlert {
                    alert_type: "mass_revocation".into(),
                    severity: Severity::Critical,
                    message: format!("Agent {} issued {} revocations in window", agent, count),
                    timestamp: ts,
                    agent_id: Some(agent.to_string()),
                });
            }
        }

        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::MetricEvent;

    fn window_with(events: Vec<MetricEvent>) -> SlidingWindow {
        let window = SlidingWindow::new(3600.0);
        for event in events {
            window.add(event);
        }
        window
    }

    #[test]
    fn test_quiet_window_no_alerts() {
        let window = window_with(vec![
            MetricEvent::new(EventType::Attestation, "a").score(0.8),
            MetricEvent::new(EventType::Attestation, "b").score(0.9),
        ]);
        assert!(AnomalyDetector::default().analyze(&window).is_empty());
    }

    #[test]
    fn test_revocation_spike() {
        let mut events = vec![MetricEvent::new(EventType::Attestation, "a").score(0.9)];
        for i in 0..4 {
            events.push(MetricEvent::new(EventType::Revocation, &format!("r{}", i)));
        }
        let alerts = AnomalyDetector::default().analyze(&window_with(events));
        assert!(alerts.iter().any(|a| a.alert_type == "revocation_spike"));
    }

    #[test]
    fn test_low_average_score() {
        let window = window_with(vec![
            MetricEvent::new(EventType::Attestation, "a").score(0.1),
            MetricEvent::new(EventType::Attestation, "b").score(0.2),
        ]);
        let alerts = AnomalyDetector::default().analyze(&window);
        assert!(alerts.iter().any(|a| a.alert_type == "low_avg_trust"));
    }

    #[test]
    fn test_failure_rate_needs_sample_size() {
        // 4 failures out of 8: above threshold but too few events.
        let mut events = Vec::new();
        for i in 0..8 {
            events.push(
                MetricEvent::new(EventType::Verification, "a")
                    .success(i % 2 == 0),
            );
        }
        let alerts = AnomalyDetector::default().analyze(&window_with(events));
        assert!(!alerts.iter().any(|a| a.alert_type == "high_failure_rate"));

        // 12 events, half failing: alert fires.
        let mut events = Vec::new();
        for i in 0..12 {
            events.push(
                MetricEvent::new(EventType::Verification, "a")
                    .success(i % 2 == 0),
            );
        }
        let alerts = AnomalyDetector::default().analyze(&window_with(events));
        assert!(alerts.iter().any(|a| a.alert_type == "high_failure_rate"));
    }

    #[test]
    fn test_latency_spike() {
        let mut events = Vec::new();
        for _ in 0..10 {
            events.push(MetricEvent::new(EventType::Verification, "a").latency(Some(10.0)));
        }
        for _ in 0..5 {
            events.push(MetricEvent::new(EventType::Verification, "a").latency(Some(500.0)));
        }
        let alerts = AnomalyDetector::default().analyze(&window_with(events));
        assert!(alerts.iter().any(|a| a.alert_type == "latency_spike"));
    }

    #[test]
    fn test_mass_revocation() {
        let mut events = Vec::new();
        for i in 0..5 {
            events.push(
                MetricEvent::new(EventType::Revocation, "agent:revoker")
                    .target(&format!("victim-{}", i)),
            );
        }
        let alerts = AnomalyDetector::default().analyze(&window_with(events));
        let mass: Vec<&AnomalyAlert> = alerts
            .iter()
            .filter(|a| a.alert_type == "mass_revocation")
            .collect();
        assert_eq!(mass.len(), 1);
        assert_eq!(mass[0].severity, Severity::Critical);
        assert_eq!(mass[0].agent_id.as_deref(), Some("agent:revoker"));
    }

    #[test]
    fn test_severity_penalties_ordered() {
        assert!(Severity::Low.penalty() < Severity::Medium.penalty());
        assert!(Severity::Medium.penalty() < Severity::High.penalty());
        assert!(Severity::High.penalty() < Severity::Critical.penalty());
    }
}
