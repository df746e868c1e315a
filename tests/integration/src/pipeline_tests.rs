//! Ledger -> events -> monitor pipeline, and scanner cycles end to end.

use crate::test_utils::{attest, three_agents};
use isnad_domain::{ConnectorMetrics, ConnectorResult, Revocation, VerificationLevel};
use isnad_events::{event_type, EventBus};
use isnad_ledger::TrustLedger;
use isnad_monitor::TrustHealthMonitor;
use isnad_scanner::{
    Connector, ConnectorRegistry, InMemoryDirectory, PlatformStore, PlatformWorker, ScannerConfig,
};
use isnad_storage::MemoryBackend;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn admission_drives_events_and_monitoring() {
    let (alice, bob, _) = three_agents();
    let mut ledger = TrustLedger::in_memory();
    let bus = EventBus::new();
    let monitor = TrustHealthMonitor::new(3600.0);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.subscribe(vec!["attestation.*".into()], None, move |event| {
        sink.lock().unwrap().push(event.event_type.clone());
    });

    // Valid attestation: admitted, event emitted, metric recorded.
    let attestation = attest(&alice, &bob.agent_id(), "qa");
    assert!(ledger.add(attestation.clone()).unwrap());
    bus.emit(
        event_type::ATTESTATION_CREATED,
        json!({"subject": attestation.subject, "witness": attestation.witness}),
        Some(attestation.witness.clone()),
    );
    monitor.record_attestation(&attestation.witness, &attestation.subject, 0.2, Some(3.0));

    // Invalid attestation: silently refused, nothing emitted.
    let mut forged = attest(&alice, &bob.agent_id(), "other");
    forged.task = "tampered".into();
    assert!(!ledger.add(forged).unwrap());

    // Revocation flows the same way.
    let revocation = Revocation::create(&alice, &bob.agent_id(), "test", None);
    ledger.revoke(revocation.clone()).unwrap();
    bus.emit(
        event_type::ATTESTATION_REVOKED,
        json!({"target_id": revocation.target_id}),
        Some(revocation.revoked_by.clone()),
    );
    monitor.record_revocation(&revocation.revoked_by, &revocation.target_id, None);

    let seen = seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec!["attestation.created".to_string(), "attestation.revoked".to_string()]
    );

    let report = monitor.health_report();
    assert_eq!(report["attestations"], 1);
    assert_eq!(report["revocations"], 1);
    assert_eq!(bus.history(None, None, None).len(), 2);
}

#[test]
fn policy_gates_on_ledger_scores() {
    use isnad_policy::{strict_commerce_policy, EvaluationContext, PolicyAction};

    let (alice, bob, _) = three_agents();
    let mut ledger = TrustLedger::in_memory();
    ledger.add(attest(&alice, &bob.agent_id(), "trade")).unwrap();

    let policy = strict_commerce_policy();
    let context = EvaluationContext {
        agent_id: bob.agent_id(),
        trust_score: ledger.trust_score(&bob.agent_id(), None),
        endorsement_count: ledger.by_subject(&bob.agent_id()).len(),
        chain_length: 1,
        chain_age_seconds: 10,
        ..Default::default()
    };

    // One attestation gives 0.2: far below the commerce bar.
    let decision = policy.evaluate(&context);
    assert_eq!(decision.action, PolicyAction::Deny);
    assert_eq!(decision.rule_name, "high-trust-score");
}

struct CountingConnector {
    calls: Arc<AtomicUsize>,
    alive: bool,
}

#[async_trait::async_trait]
impl Connector for CountingConnector {
    fn platform_name(&self) -> &'static str {
        "counting"
    }

    async fn fetch(&self, url: &str) -> ConnectorResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.alive {
            ConnectorResult {
                platform: "counting".into(),
                url: url.into(),
                alive: true,
                raw_data: json!({"observed": true}),
                metrics: ConnectorMetrics {
                    activity_score: 60,
                    reputation_score: 30,
                    longevity_days: 365,
                    verification_level: VerificationLevel::Verified,
                    evidence_count: 3,
                },
            }
        } else {
            ConnectorResult::dead("counting", url, "connection refused")
        }
    }
}

fn worker_with(alive: bool) -> (Arc<PlatformWorker>, Arc<InMemoryDirectory>, Arc<AtomicUsize>) {
    let directory = Arc::new(InMemoryDirectory::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = ConnectorRegistry::with_fallback(Arc::new(CountingConnector {
        calls: calls.clone(),
        alive,
    }));
    let config = ScannerConfig {
        interval: Duration::from_secs(3600),
        rate_limit_rps: 1000.0,
        fetch_deadline: Duration::from_secs(5),
    };
    let worker = Arc::new(
        PlatformWorker::new(
            directory.clone(),
            PlatformStore::new(Arc::new(MemoryBackend::new())),
            config,
        )
        .with_registry(registry),
    );
    (worker, directory, calls)
}

#[tokio::test]
async fn scan_cycle_persists_normalized_metrics() {
    let (worker, directory, calls) = worker_with(true);
    directory.add_platform("agent:a", "counting", "https://platform.example/a");
    directory.add_platform("agent:b", "counting", "https://platform.example/b");

    assert_eq!(worker.scan_all().await, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let data = worker.platform_data("agent:a").unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].metrics.activity_score, 60);
    assert_eq!(data[0].metrics.verification_level, VerificationLevel::Verified);
    assert_eq!(data[0].raw_data["observed"], true);
}

#[tokio::test]
async fn dead_platforms_are_recorded_not_fatal() {
    let (worker, directory, _) = worker_with(false);
    directory.add_platform("agent:a", "counting", "https://down.example");
    directory.add_platform("agent:b", "counting", "https://down.example/other");

    // Both scans fail but the cycle still covers everything.
    assert_eq!(worker.scan_all().await, 2);

    let data = worker.platform_data("agent:a").unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0].metrics.reputation_score, 0);
    assert_eq!(data[0].raw_data["error"], "connection refused");
}

#[tokio::test]
async fn manual_scan_matches_cycle_results() {
    let (worker, directory, _) = worker_with(true);
    directory.add_platform("agent:a", "counting", "https://platform.example/a");

    let results = worker.scan_agent("agent:a").await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].alive);

    // Rescan updates in place rather than duplicating.
    worker.scan_all().await;
    assert_eq!(worker.platform_data("agent:a").unwrap().len(), 1);
}
