//! Bundle export/import across ledgers, including the tamper scenario.

use crate::test_utils::triangle;
use isnad_ledger::{bundle, LedgerError};
use serde_json::json;
use std::collections::HashSet;

#[test]
fn signed_roundtrip_preserves_ids() {
    let (ledger, alice, _, _) = triangle();
    let exported = bundle::export_bundle(&ledger, Some(&alice), None).unwrap();
    let imported = bundle::from_bundle(&exported, true).unwrap();

    let original: HashSet<String> = ledger
        .attestations()
        .iter()
        .map(|a| a.attestation_id())
        .collect();
    let roundtripped: HashSet<String> = imported
        .attestations()
        .iter()
        .map(|a| a.attestation_id())
        .collect();
    assert_eq!(original, roundtripped);
}

#[test]
fn bundle_tamper_detected() {
    let (ledger, alice, _, _) = triangle();
    let mut exported = bundle::export_bundle(&ledger, Some(&alice), None).unwrap();

    // Flip one byte of one attestation's task.
    let task = exported.attestations[0]["task"].as_str().unwrap().to_string();
    let mut bytes = task.into_bytes();
    bytes[0] ^= 0x01;
    exported.attestations[0]["task"] = json!(String::from_utf8(bytes).unwrap());

    let result = bundle::from_bundle(&exported, true);
    assert!(matches!(result, Err(LedgerError::BundleIncompatible(_))));
}

#[test]
fn bundle_json_roundtrip() {
    let (ledger, alice, _, _) = triangle();
    let exported = bundle::export_bundle(&ledger, Some(&alice), Some(json!({"hop": 1}))).unwrap();

    // Through serialization, as it would travel between systems.
    let text = serde_json::to_string(&exported).unwrap();
    let parsed: bundle::Bundle = serde_json::from_str(&text).unwrap();

    let imported = bundle::from_bundle(&parsed, true).unwrap();
    assert_eq!(imported.len(), 3);
    assert_eq!(parsed.metadata["hop"], 1);
}

#[test]
fn imported_records_admit_into_other_ledger() {
    let (ledger, _, _, carol) = triangle();
    let exported = bundle::export_bundle(&ledger, None, None).unwrap();
    let staging = bundle::from_bundle(&exported, true).unwrap();

    let mut other = isnad_ledger::TrustLedger::in_memory();
    let mut added = 0;
    for attestation in staging.attestations() {
        if other.add(attestation.clone()).unwrap() {
            added += 1;
        }
    }
    assert_eq!(added, 3);
    assert!((other.trust_score(&carol.agent_id(), None) - 0.4).abs() < 1e-9);
}
