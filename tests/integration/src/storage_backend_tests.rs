//! The ledger behaves identically over every backend, and non-memory
//! backends survive a restart.

use crate::test_utils::{assert_close, attest, three_agents};
use isnad_domain::Revocation;
use isnad_ledger::TrustLedger;
use isnad_storage::{JsonlBackend, MemoryBackend, SqliteBackend, StorageBackend};
use std::sync::Arc;

fn exercise_ledger(backend: Arc<dyn StorageBackend>) {
    let (alice, bob, carol) = three_agents();

    {
        let mut ledger = TrustLedger::new(backend.clone()).unwrap();
        assert!(ledger.add(attest(&alice, &bob.agent_id(), "code-review")).unwrap());
        assert!(ledger.add(attest(&bob, &carol.agent_id(), "deploy")).unwrap());
        ledger
            .revoke(Revocation::create(&alice, &carol.agent_id(), "test", None))
            .unwrap();
    }

    // Reopen over the same backend: everything replays.
    let ledger = TrustLedger::new(backend).unwrap();
    assert_eq!(ledger.len(), 2);
    assert_close(ledger.trust_score(&bob.agent_id(), None), 0.2);
    assert_close(ledger.trust_score(&carol.agent_id(), None), 0.0);
    assert!(ledger.is_revoked(&carol.agent_id(), None));
}

#[test]
fn ledger_over_memory_backend() {
    exercise_ledger(Arc::new(MemoryBackend::new()));
}

#[test]
fn ledger_over_sqlite_backend() {
    let path = std::env::temp_dir().join(format!("isnad_it_{}.db", uuid::Uuid::new_v4()));
    exercise_ledger(Arc::new(SqliteBackend::open(&path).unwrap()));
    std::fs::remove_file(&path).ok();
}

#[test]
fn ledger_over_jsonl_backend() {
    let path = std::env::temp_dir().join(format!("isnad_it_{}.jsonl", uuid::Uuid::new_v4()));
    exercise_ledger(Arc::new(JsonlBackend::open(&path).unwrap()));
    std::fs::remove_file(&path).ok();
}

#[test]
fn sqlite_survives_process_restart() {
    let path = std::env::temp_dir().join(format!("isnad_it_{}.db", uuid::Uuid::new_v4()));
    let (alice, bob, _) = three_agents();

    {
        let backend: Arc<dyn StorageBackend> = Arc::new(SqliteBackend::open(&path).unwrap());
        let mut ledger = TrustLedger::new(backend).unwrap();
        ledger.add(attest(&alice, &bob.agent_id(), "qa")).unwrap();
    }

    // A separate open simulates a fresh process.
    let backend: Arc<dyn StorageBackend> = Arc::new(SqliteBackend::open(&path).unwrap());
    let ledger = TrustLedger::new(backend).unwrap();
    assert_eq!(ledger.len(), 1);
    assert_close(ledger.trust_score(&bob.agent_id(), None), 0.2);

    std::fs::remove_file(&path).ok();
}

#[test]
fn jsonl_survives_process_restart_with_erasure() {
    let path = std::env::temp_dir().join(format!("isnad_it_{}.jsonl", uuid::Uuid::new_v4()));
    let (alice, bob, carol) = three_agents();

    {
        let backend: Arc<dyn StorageBackend> = Arc::new(JsonlBackend::open(&path).unwrap());
        let mut ledger = TrustLedger::new(backend).unwrap();
        ledger.add(attest(&alice, &bob.agent_id(), "qa")).unwrap();
        ledger.add(attest(&alice, &carol.agent_id(), "qa")).unwrap();
        ledger.erase_agent(&bob.agent_id()).unwrap();
    }

    let backend: Arc<dyn StorageBackend> = Arc::new(JsonlBackend::open(&path).unwrap());
    let ledger = TrustLedger::new(backend).unwrap();
    assert_eq!(ledger.len(), 1);
    assert!(ledger.by_subject(&bob.agent_id()).is_empty());
    assert_eq!(ledger.by_subject(&carol.agent_id()).len(), 1);

    std::fs::remove_file(&path).ok();
}
