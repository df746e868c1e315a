//! Shared fixtures.

use isnad_domain::Attestation;
use isnad_identity::Identity;
use isnad_ledger::TrustLedger;

/// Three fresh identities.
pub fn three_agents() -> (Identity, Identity, Identity) {
    (Identity::generate(), Identity::generate(), Identity::generate())
}

/// Sign an attestation with empty evidence.
pub fn attest(witness: &Identity, subject: &str, task: &str) -> Attestation {
    Attestation::create(witness, subject, task, "")
}

/// The triangle from the scoring scenarios: Alice -> Bob (code-review),
/// Bob -> Carol (service-deployment), Alice -> Carol (integration-testing).
pub fn triangle() -> (TrustLedger, Identity, Identity, Identity) {
    let (alice, bob, carol) = three_agents();
    let mut ledger = TrustLedger::in_memory();

    assert!(ledger.add(attest(&alice, &bob.agent_id(), "code-review")).unwrap());
    assert!(ledger
        .add(attest(&bob, &carol.agent_id(), "service-deployment"))
        .unwrap());
    assert!(ledger
        .add(attest(&alice, &carol.agent_id(), "integration-testing"))
        .unwrap());

    (ledger, alice, bob, carol)
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}
