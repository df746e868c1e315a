//! Sliding event window.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Kinds of operations the monitor tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Attestation,
    Revocation,
    Delegation,
    Verification,
    PlatformScan,
    BundleSync,
}

/// A single recorded metric event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricEvent {
    pub event_type: EventType,
    /// Unix seconds.
    pub timestamp: f64,
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    pub success: bool,
}

impl MetricEvent {
    pub fn new(event_type: EventType, agent_id: &str) -> Self {
        Self {
            event_type,
            timestamp: now(),
            agent_id: agent_id.to_string(),
            target_id: None,
            score: None,
            latency_ms: None,
            success: true,
        }
    }

    pub fn target(mut self, target_id: &str) -> Self {
        self.target_id = Some(target_id.to_string());
        self
    }

    pub fn score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn latency(mut self, latency_ms: Option<f64>) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    pub fn success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    #[cfg(test)]
    pub(crate) fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

pub(crate) fn now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs_f64()
}

/// Time-bounded event buffer. Events older than the window are pruned on
/// every read and write, so the buffer never grows past the active window.
pub struct SlidingWindow {
    window_seconds: f64,
    events: Mutex<Vec<MetricEvent>>,
}

impl SlidingWindow {
    pub fn new(window_seconds: f64) -> Self {
        Self {
            window_seconds,
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn window_seconds(&self) -> f64 {
        self.window_seconds
    }

    pub fn add(&self, event: MetricEvent) {
        let mut events = self.events.lock().expect("window poisoned");
        events.push(event);
        let cutoff = now() - self.window_seconds;
        events.retain(|e| e.timestamp >= cutoff);
    }

    /// Events in the window, oldest first, optionally filtered by type.
    pub fn events(&self, event_type: Option<EventType>) -> Vec<MetricEvent> {
        let mut events = self.events.lock().expect("window poisoned");
        let cutoff = now() - self.window_seconds;
        events.retain(|e| e.timestamp >= cutoff);
        events
            .iter()
            .filter(|e| event_type.map(|t| e.event_type == t).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub fn count(&self, event_type: Option<EventType>) -> usize {
        self.events(event_type).len()
    }

    /// Observed rate over the span since the oldest in-window event.
    pub fn rate_per_minute(&self, event_type: Option<EventType>) -> f64 {
        let events = self.events(event_type);
        if events.is_empty() {
            return 0.0;
        }
        let span = now() - events[0].timestamp;
        if span < 1.0 {
            return events.len() as f64;
        }
        events.len() as f64 / (span / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_count() {
        let window = SlidingWindow::new(3600.0);
        window.add(MetricEvent::new(EventType::Attestation, "agent:a"));
        window.add(MetricEvent::new(EventType::Revocation, "agent:a"));

        assert_eq!(window.count(None), 2);
        assert_eq!(window.count(Some(EventType::Attestation)), 1);
        assert_eq!(window.count(Some(EventType::Delegation)), 0);
    }

    #[test]
    fn test_old_events_pruned() {
        let window = SlidingWindow::new(10.0);
        window.add(MetricEvent::new(EventType::Attestation, "agent:old").at(now() - 60.0));
        window.add(MetricEvent::new(EventType::Attestation, "agent:new"));

        let events = window.events(None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].agent_id, "agent:new");
    }

    #[test]
    fn test_rate_per_minute() {
        let window = SlidingWindow::new(3600.0);
        // Three events spread over the last 60 seconds.
        window.add(MetricEvent::new(EventType::Attestation, "a").at(now() - 60.0));
        window.add(MetricEvent::new(EventType::Attestation, "a").at(now() - 30.0));
        window.add(MetricEvent::new(EventType::Attestation, "a"));

        let rate = window.rate_per_minute(Some(EventType::Attestation));
        assert!((rate - 3.0).abs() < 0.5, "rate was {}", rate);
    }

    #[test]
    fn test_event_builder() {
        let event = MetricEvent::new(EventType::Verification, "agent:a")
            .target("agent:b")
            .score(0.9)
            .latency(Some(4.2))
            .success(false);

        assert_eq!(event.target_id.as_deref(), Some("agent:b"));
        assert_eq!(event.score, Some(0.9));
        assert_eq!(event.latency_ms, Some(4.2));
        assert!(!event.success);
    }
}
