//! End-to-end ledger scenarios with literal expected values.

use crate::test_utils::{assert_close, attest, three_agents, triangle};
use isnad_domain::{Delegation, DomainError, Revocation};
use isnad_identity::Identity;
use isnad_ledger::{DelegationRegistry, RevocationRegistry, TrustLedger};
use isnad_storage::MemoryBackend;
use std::sync::Arc;

#[test]
fn triangle_scoring() {
    let (ledger, alice, bob, carol) = triangle();

    assert_close(ledger.trust_score(&bob.agent_id(), None), 0.2);
    assert_close(ledger.trust_score(&carol.agent_id(), None), 0.4);
    // Direct edge beats the 0.49 two-hop product.
    assert_close(ledger.chain_trust(&alice.agent_id(), &carol.agent_id(), 5), 0.7);
}

#[test]
fn same_witness_decay() {
    let witness = Identity::generate();
    let subject = Identity::generate();
    let mut ledger = TrustLedger::in_memory();

    for task in ["deploy", "review", "triage"] {
        assert!(ledger.add(attest(&witness, &subject.agent_id(), task)).unwrap());
    }

    // 0.2 + 0.2*0.5 + 0.2*0.25
    assert_close(ledger.trust_score(&subject.agent_id(), None), 0.35);
}

#[test]
fn scope_filter() {
    let (ledger, _, _, carol) = triangle();

    // Neither of Carol's attestations has "code" in its task.
    assert_close(ledger.trust_score(&carol.agent_id(), Some("code")), 0.0);
    // "deploy" matches "service-deployment".
    assert_close(ledger.trust_score(&carol.agent_id(), Some("deploy")), 0.2);
}

#[test]
fn revocation_wipe() {
    let (mut ledger, alice, bob, carol) = triangle();

    ledger
        .revoke(Revocation::create(&alice, &carol.agent_id(), "fraud", None))
        .unwrap();

    assert_close(ledger.trust_score(&carol.agent_id(), None), 0.0);
    assert_close(ledger.trust_score(&bob.agent_id(), None), 0.2);

    // New attestations for a revoked subject are refused.
    let fresh = attest(&bob, &carol.agent_id(), "another-task");
    assert!(!ledger.add(fresh).unwrap());

    // No unrevoke: the score stays zero.
    assert_close(ledger.trust_score(&carol.agent_id(), None), 0.0);
}

#[test]
fn sub_delegation_narrowing() {
    let (principal, delegate, grandchild) = three_agents();
    let backend: Arc<dyn isnad_storage::StorageBackend> = Arc::new(MemoryBackend::new());
    let mut registry = DelegationRegistry::new(backend.clone()).unwrap();
    let revocations = RevocationRegistry::new(backend).unwrap();

    let parent = Delegation::create(
        &principal,
        &delegate.agent_id(),
        vec!["trade".into(), "review".into()],
        None,
        2,
    )
    .unwrap();
    assert!(registry.add(parent.clone(), &revocations).unwrap());

    let child = parent
        .sub_delegate(&delegate, &grandchild.agent_id(), vec!["review".into()], None, None)
        .unwrap();
    let child_id = child.delegation_id();
    assert!(registry.add(child, &revocations).unwrap());

    let verdict = registry.verify_chain(&child_id, isnad_domain::unix_now(), &revocations);
    assert!(verdict.valid, "{}", verdict.reason);

    // Widening the scope set must be refused at creation.
    let widened = parent.sub_delegate(
        &delegate,
        &grandchild.agent_id(),
        vec!["admin".into()],
        None,
        None,
    );
    assert!(matches!(widened, Err(DomainError::DelegationConstraint(_))));
}

#[test]
fn duplicate_admission_keeps_size() {
    let witness = Identity::generate();
    let subject = Identity::generate();
    let mut ledger = TrustLedger::in_memory();
    let attestation = attest(&witness, &subject.agent_id(), "qa");

    assert!(ledger.add(attestation.clone()).unwrap());
    assert!(!ledger.add(attestation).unwrap());
    assert_eq!(ledger.len(), 1);
}

#[test]
fn transitive_trust_is_monotone_in_hops() {
    let (ledger, alice, _, carol) = triangle();
    let mut previous = 0.0;
    for hops in 1..=6 {
        let trust = ledger.chain_trust(&alice.agent_id(), &carol.agent_id(), hops);
        assert!(trust >= previous, "hops={} dropped {} -> {}", hops, previous, trust);
        previous = trust;
    }
    assert_close(ledger.chain_trust(&alice.agent_id(), &alice.agent_id(), 5), 1.0);
}

#[test]
fn scores_stay_bounded() {
    let subject = Identity::generate();
    let mut ledger = TrustLedger::in_memory();
    for i in 0..20 {
        let witness = Identity::generate();
        ledger
            .add(attest(&witness, &subject.agent_id(), &format!("task-{}", i)))
            .unwrap();
    }

    let score = ledger.trust_score(&subject.agent_id(), None);
    assert!((0.0..=1.0).contains(&score));
    assert_close(score, 1.0);
}

#[test]
fn key_rotation_preserves_history() {
    let (old_alice, bob, _) = three_agents();
    let mut ledger = TrustLedger::in_memory();

    ledger.add(attest(&old_alice, &bob.agent_id(), "qa")).unwrap();

    let (new_alice, rotation) = old_alice.rotate();
    assert!(ledger.add_rotation(rotation.clone()).unwrap());

    // Historic attestations keep the old witness id; the rotation record
    // documents the transition.
    assert_eq!(ledger.by_witness(&old_alice.agent_id()).len(), 1);
    assert!(ledger.by_witness(&new_alice.agent_id()).is_empty());
    let rotations = ledger.rotations().unwrap();
    assert_eq!(rotations[0].new_agent_id, new_alice.agent_id());
}
