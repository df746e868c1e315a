//! Trust event notification system
//!
//! Internal pub/sub for ledger events with glob-style pattern subscriptions
//! (`*`, `attestation.*`). Emitting an event appends it to a bounded
//! history ring and invokes every matching callback synchronously, in
//! subscription order; a panicking subscriber is caught and logged so the
//! rest still run. Webhook subscribers are dispatched fire-and-forget on a
//! background task with a request timeout — delivery failures are dropped.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use isnad_crypto::{canonical_json, content_id};

/// Default history ring capacity.
pub const DEFAULT_MAX_HISTORY: usize = 1000;

/// Webhook delivery timeout.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(5);

/// Well-known event type strings.
pub mod event_type {
    pub const ATTESTATION_CREATED: &str = "attestation.created";
    pub const ATTESTATION_REVOKED: &str = "attestation.revoked";
    pub const AGENT_REGISTERED: &str = "agent.registered";
    pub const SCORE_UPDATED: &str = "score.updated";
    pub const DELEGATION_CREATED: &str = "delegation.created";
}

/// A single trust event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Deterministic 16-hex id over `{event_type, timestamp, data}`.
    pub event_id: String,
    pub event_type: String,
    pub data: Value,
    /// Unix seconds.
    pub timestamp: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_agent: Option<String>,
}

impl Event {
    pub fn new(event_type: &str, data: Value, source_agent: Option<String>) -> Self {
        Self::with_timestamp(event_type, data, source_agent, now())
    }

    pub fn with_timestamp(
        event_type: &str,
        data: Value,
        source_agent: Option<String>,
        timestamp: f64,
    ) -> Self {
        let payload = json!({
            "event_type": event_type,
            "timestamp": timestamp,
            "data": data,
        });
        let event_id = content_id(&canonical_json(&payload).expect("event payload is plain JSON"));
        Self {
            event_id,
            event_type: event_type.to_string(),
            data,
            timestamp,
            source_agent,
        }
    }
}

fn now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs_f64()
}

/// Glob match supporting `*` as "any sequence".
fn glob_match(pattern: &str, value: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == value;
    }
    let segments: Vec<&str> = pattern.split('*').collect();
    let mut rest = value;
    for (i, segment) in segments.iter().enumerate() {
        if segment.is_empty() {
            continue;
        }
        if i == 0 {
            match rest.strip_prefix(segment) {
                Some(stripped) => rest = stripped,
                None => return false,
            }
        } else if i == segments.len() - 1 && !pattern.ends_with('*') {
            return rest.ends_with(segment);
        } else {
            match rest.find(segment) {
                Some(pos) => rest = &rest[pos + segment.len()..],
                None => return false,
            }
        }
    }
    true
}

type Callback = Arc<dyn Fn(&Event) + Send + Sync>;

/// A subscriber: patterns plus either a callback or a webhook URL.
#[derive(Clone)]
pub struct Subscription {
    pub subscriber_id: String,
    pub patterns: Vec<String>,
    callback: Option<Callback>,
    webhook_url: Option<String>,
}

impl Subscription {
    pub fn new(subscriber_id: &str, patterns: Vec<String>) -> Self {
        Self {
            subscriber_id: subscriber_id.to_string(),
            patterns,
            callback: None,
            webhook_url: None,
        }
    }

    /// Whether any pattern matches the event type.
    pub fn matches(&self, event_type: &str) -> bool {
        self.patterns.iter().any(|p| glob_match(p, event_type))
    }
}

/// Publish-subscribe bus with bounded history.
pub struct EventBus {
    subscriptions: Mutex<Vec<Subscription>>,
    history: Mutex<VecDeque<Event>>,
    max_history: usize,
    http: reqwest::Client,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_MAX_HISTORY)
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscriptions: Mutex::new(Vec::new()),
            history: Mutex::new(VecDeque::new()),
            max_history,
            http: reqwest::Client::new(),
        }
    }

    /// Subscribe a callback to one or more patterns. Returns the
    /// subscriber id (generated unless supplied).
    pub fn subscribe(
        &self,
        patterns: Vec<String>,
        subscriber_id: Option<String>,
        callback: impl Fn(&Event) + Send + Sync + 'static,
    ) -> String {
        let id = subscriber_id.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let mut subscription = Subscription::new(&id, patterns);
        subscription.callback = Some(Arc::new(callback));
        self.subscriptions
            .lock()
            .expect("event bus poisoned")
            .push(subscription);
        id
    }

    /// Register a webhook receiving matching events as JSON POSTs.
    pub fn add_webhook(
        &self,
        url: &str,
        patterns: Vec<String>,
        subscriber_id: Option<String>,
    ) -> String {
        let id = subscriber_id.unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let mut subscription = Subscription::new(&id, patterns);
        subscription.webhook_url = Some(url.to_string());
        self.subscriptions
            .lock()
            .expect("event bus poisoned")
            .push(subscription);
        id
    }

    pub fn unsubscribe(&self, subscriber_id: &str) -> bool {
        let mut subscriptions = self.subscriptions.lock().expect("event bus poisoned");
        let before = subscriptions.len();
        subscriptions.retain(|s| s.subscriber_id != subscriber_id);
        subscriptions.len() != before
    }

    /// Emit an event: record it, then notify matching subscribers in
    /// subscription order.
    pub fn emit(&self, event_type: &str, data: Value, source_agent: Option<String>) -> Event {
        let event = Event::new(event_type, data, source_agent);

        {
            let mut history = self.history.lock().expect("event bus poisoned");
            history.push_back(event.clone());
            while history.len() > self.max_history {
                history.pop_front();
            }
        }

        // Snapshot matching subscribers so callbacks run outside the lock
        // and may themselves subscribe.
        let matching: Vec<Subscription> = {
            let subscriptions = self.subscriptions.lock().expect("event bus poisoned");
            subscriptions
                .iter()
                .filter(|s| s.matches(&event.event_type))
                .cloned()
                .collect()
        };

        for subscription in matching {
            if let Some(callback) = &subscription.callback {
                let result = catch_unwind(AssertUnwindSafe(|| callback(&event)));
                if result.is_err() {
                    warn!(
                        subscriber_id = %subscription.subscriber_id,
                        event_type = %event.event_type,
                        "Subscriber callback panicked"
                    );
                }
            }
            if let Some(url) = &subscription.webhook_url {
                self.dispatch_webhook(url, &event);
            }
        }

        event
    }

    /// Best-effort webhook delivery on a background task. Outside a tokio
    /// runtime the dispatch is skipped.
    fn dispatch_webhook(&self, url: &str, event: &Event) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                debug!(url = %url, "No async runtime, webhook skipped");
                return;
            }
        };
        let client = self.http.clone();
        let url = url.to_string();
        let body = serde_json::to_value(event).unwrap_or(Value::Null);
        handle.spawn(async move {
            let result = client
                .post(&url)
                .timeout(WEBHOOK_TIMEOUT)
                .json(&body)
                .send()
                .await;
            if let Err(e) = result {
                debug!(url = %url, error = %e, "Webhook delivery failed");
            }
        });
    }

    /// History, newest last, optionally filtered by exact event type and
    /// timestamp floor, capped at `limit`.
    pub fn history(
        &self,
        event_type: Option<&str>,
        since: Option<f64>,
        limit: Option<usize>,
    ) -> Vec<Event> {
        let history = self.history.lock().expect("event bus poisoned");
        let filtered: Vec<Event> = history
            .iter()
            .filter(|e| event_type.map(|t| e.event_type == t).unwrap_or(true))
            .filter(|e| since.map(|s| e.timestamp > s).unwrap_or(true))
            .cloned()
            .collect();
        match limit {
            Some(limit) if filtered.len() > limit => {
                filtered[filtered.len() - limit..].to_vec()
            }
            _ => filtered,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.lock().expect("event bus poisoned").len()
    }

    /// Subscription metadata for introspection endpoints.
    pub fn list_subscriptions(&self) -> Vec<Value> {
        self.subscriptions
            .lock()
            .expect("event bus poisoned")
            .iter()
            .map(|s| {
                json!({
                    "subscriber_id": s.subscriber_id,
                    "patterns": s.patterns,
                    "webhook_url": s.webhook_url,
                })
            })
            .collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_event_id_deterministic() {
        let a = Event::with_timestamp("test", json!({"x": 1}), None, 1_700_000_000.0);
        let b = Event::with_timestamp("test", json!({"x": 1}), None, 1_700_000_000.0);
        assert_eq!(a.event_id, b.event_id);
        assert_eq!(a.event_id.len(), 16);

        let c = Event::with_timestamp("test", json!({"x": 2}), None, 1_700_000_000.0);
        assert_ne!(a.event_id, c.event_id);
    }

    #[test]
    fn test_glob_patterns() {
        let s = Subscription::new("s1", vec!["attestation.*".into()]);
        assert!(s.matches("attestation.created"));
        assert!(s.matches("attestation.revoked"));
        assert!(!s.matches("score.updated"));

        let all = Subscription::new("s2", vec!["*".into()]);
        assert!(all.matches("anything"));

        let exact = Subscription::new("s3", vec!["attestation.created".into()]);
        assert!(exact.matches("attestation.created"));
        assert!(!exact.matches("attestation.revoked"));

        let multi = Subscription::new("s4", vec!["attestation.*".into(), "score.*".into()]);
        assert!(multi.matches("score.updated"));
        assert!(!multi.matches("agent.registered"));
    }

    #[test]
    fn test_subscribe_and_emit() {
        let bus = EventBus::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        bus.subscribe(vec!["attestation.created".into()], None, move |e| {
            sink.lock().unwrap().push(e.clone());
        });

        bus.emit("attestation.created", json!({"from": "a", "to": "b"}), None);
        bus.emit("score.updated", json!({}), None);

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].data["from"], "a");
    }

    #[test]
    fn test_emission_order_and_pattern_filtering() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let sink = log.clone();
        bus.subscribe(vec!["attestation.*".into()], Some("att".into()), move |e| {
            sink.lock().unwrap().push(("att", e.event_type.clone()));
        });
        let sink = log.clone();
        bus.subscribe(vec!["*".into()], Some("all".into()), move |e| {
            sink.lock().unwrap().push(("all", e.event_type.clone()));
        });

        bus.emit("attestation.created", json!({}), None);
        bus.emit("score.updated", json!({}), None);

        let log = log.lock().unwrap();
        // Subscription order per event, events in emit order.
        assert_eq!(log.len(), 3);
        assert_eq!(log[0], ("att", "attestation.created".to_string()));
        assert_eq!(log[1], ("all", "attestation.created".to_string()));
        assert_eq!(log[2], ("all", "score.updated".to_string()));
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let id = bus.subscribe(vec!["*".into()], None, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit("test", json!({}), None);
        assert!(bus.unsubscribe(&id));
        bus.emit("test", json!({}), None);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!bus.unsubscribe("nonexistent"));
    }

    #[test]
    fn test_panicking_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        bus.subscribe(vec!["test".into()], None, |_| panic!("boom"));
        let counter = count.clone();
        bus.subscribe(vec!["test".into()], None, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit("test", json!({}), None);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_history_filters_and_cap() {
        let bus = EventBus::with_max_history(5);
        for i in 0..10 {
            bus.emit("a", json!({"i": i}), None);
        }
        bus.emit("b", json!({}), None);

        let all = bus.history(None, None, None);
        assert_eq!(all.len(), 5);
        // Oldest entries were evicted.
        assert_eq!(all[0].data["i"], 6);

        assert_eq!(bus.history(Some("b"), None, None).len(), 1);
        assert_eq!(bus.history(Some("a"), None, Some(2)).len(), 2);
    }

    #[test]
    fn test_history_since() {
        let bus = EventBus::new();
        let old = bus.emit("old", json!({}), None);
        let recent = bus.history(None, Some(old.timestamp), None);
        assert!(recent.is_empty());

        bus.emit("new", json!({}), None);
        let recent = bus.history(None, Some(old.timestamp), None);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].event_type, "new");
    }

    #[test]
    fn test_emit_returns_event_with_source() {
        let bus = EventBus::new();
        let event = bus.emit("test", json!({"k": "v"}), Some("agent:x".into()));
        assert_eq!(event.source_agent.as_deref(), Some("agent:x"));
        assert_eq!(event.data["k"], "v");
    }

    #[test]
    fn test_custom_subscriber_id_and_listing() {
        let bus = EventBus::new();
        bus.subscribe(vec!["attestation.*".into()], Some("my-sub".into()), |_| {});
        bus.add_webhook("https://example.com/hook", vec!["score.*".into()], Some("my-wh".into()));

        assert_eq!(bus.subscriber_count(), 2);
        let listed = bus.list_subscriptions();
        let ids: Vec<&str> = listed
            .iter()
            .map(|s| s["subscriber_id"].as_str().unwrap())
            .collect();
        assert!(ids.contains(&"my-sub"));
        assert!(ids.contains(&"my-wh"));
        assert_eq!(listed[1]["webhook_url"], "https://example.com/hook");
    }

    #[tokio::test]
    async fn test_webhook_failure_is_silent() {
        let bus = EventBus::new();
        bus.add_webhook("http://127.0.0.1:1/unreachable", vec!["test".into()], None);
        // Must not panic or error; delivery failure is dropped.
        bus.emit("test", json!({"x": 1}), None);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[test]
    fn test_webhook_without_runtime_is_skipped() {
        let bus = EventBus::new();
        bus.add_webhook("https://example.com/hook", vec!["*".into()], None);
        // No tokio runtime in a plain #[test]; emit must still work.
        let event = bus.emit("test", json!({}), None);
        assert_eq!(event.event_type, "test");
    }
}
