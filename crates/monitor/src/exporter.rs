//! Prometheus text exposition.

use crate::TrustHealthMonitor;

/// Exports monitor state in Prometheus text format.
pub struct MetricsExporter<'m> {
    monitor: &'m TrustHealthMonitor,
}

impl<'m> MetricsExporter<'m> {
    pub fn new(monitor: &'m TrustHealthMonitor) -> Self {
        Self { monitor }
    }

    /// Prometheus text exposition of the current health report.
    pub fn prometheus(&self) -> String {
        let report = self.monitor.health_report();
        let mut lines = vec![
            "# HELP isnad_health_score Trust network health score (0-1)".to_string(),
            "# TYPE isnad_health_score gauge".to_string(),
            format!("isnad_health_score {}", report["score"]),
            String::new(),
            "# HELP isnad_events_total Total trust events in window".to_string(),
            "# TYPE isnad_events_total gauge".to_string(),
            format!("isnad_events_total {}", report["total_events"]),
            String::new(),
            "# HELP isnad_attestations_total Attestations in window".to_string(),
            "# TYPE isnad_attestations_total gauge".to_string(),
            format!("isnad_attestations_total {}", report["attestations"]),
            String::new(),
            "# HELP isnad_revocations_total Revocations in window".to_string(),
            "# TYPE isnad_revocations_total gauge".to_string(),
            format!("isnad_revocations_total {}", report["revocations"]),
            String::new(),
            "# HELP isnad_verifications_total Verifications in window".to_string(),
            "# TYPE isnad_verifications_total gauge".to_string(),
            format!("isnad_verifications_total {}", report["verifications"]),
            String::new(),
            "# HELP isnad_active_agents Active agents in network".to_string(),
            "# TYPE isnad_active_agents gauge".to_string(),
            format!("isnad_active_agents {}", report["active_agents"]),
            String::new(),
            "# HELP isnad_attestation_rate Attestations per minute".to_string(),
            "# TYPE isnad_attestation_rate gauge".to_string(),
            format!(
                "isnad_attestation_rate {}",
                report["attestation_rate_per_min"]
            ),
            String::new(),
            "# HELP isnad_anomalies_total Active anomaly alerts".to_string(),
            "# TYPE isnad_anomalies_total gauge".to_string(),
            format!(
                "isnad_anomalies_total {}",
                report["anomalies"].as_array().map(Vec::len).unwrap_or(0)
            ),
        ];

        let latency = &report["latency"];
        if latency["p50_ms"].is_number() {
            lines.push(String::new());
            lines.push("# HELP isnad_latency_p50_ms Median operation latency".to_string());
            lines.push("# TYPE isnad_latency_p50_ms gauge".to_string());
            lines.push(format!(
                "isnad_latency_p50_ms {:.1}",
                latency["p50_ms"].as_f64().unwrap_or(0.0)
            ));
            lines.push(String::new());
            lines.push(
                "# HELP isnad_latency_p95_ms 95th percentile operation latency".to_string(),
            );
            lines.push("# TYPE isnad_latency_p95_ms gauge".to_string());
            lines.push(format!(
                "isnad_latency_p95_ms {:.1}",
                latency["p95_ms"].as_f64().unwrap_or(0.0)
            ));
        }

        lines.join("\n") + "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prometheus_format() {
        let monitor = TrustHealthMonitor::new(3600.0);
        monitor.record_attestation("agent:a", "agent:b", 0.9, Some(8.0));

        let text = MetricsExporter::new(&monitor).prometheus();
        assert!(text.contains("# TYPE isnad_health_score gauge"));
        assert!(text.contains("isnad_attestations_total 1"));
        assert!(text.contains("isnad_latency_p50_ms 8.0"));
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_prometheus_without_latency() {
        let monitor = TrustHealthMonitor::new(3600.0);
        monitor.record_attestation("agent:a", "agent:b", 0.9, None);

        let text = MetricsExporter::new(&monitor).prometheus();
        assert!(!text.contains("isnad_latency_p50_ms"));
        assert!(text.contains("isnad_events_total 1"));
    }
}
