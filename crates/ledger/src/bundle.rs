//! Portable signed bundles (`isnad-bundle/v1`).
//!
//! A bundle is a snapshot of a ledger slice for cross-system sharing. The
//! optional envelope signature covers the canonical JSON of
//! `{attestations, metadata}` only — stats and timestamps can be
//! regenerated without invalidating it. Import verifies the envelope first,
//! then re-verifies every attestation individually, skipping (not failing
//! on) the ones that don't check out.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::chain::{LedgerStats, TrustLedger};
use crate::error::{LedgerError, Result};
use isnad_crypto::{canonical_json, verify_hex};
use isnad_domain::Attestation;
use isnad_identity::Identity;

/// The only bundle version this implementation reads or writes.
pub const BUNDLE_VERSION: &str = "isnad-bundle/v1";

pub type BundleStats = LedgerStats;

/// Portable, optionally signed snapshot of a ledger slice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub version: String,
    pub created_at: String,
    #[serde(default)]
    pub metadata: Value,
    pub attestations: Vec<Value>,
    pub stats: BundleStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signer_pubkey: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl Bundle {
    /// Canonical bytes the envelope signature covers.
    fn signed_payload(attestations: &[Value], metadata: &Value) -> Result<Vec<u8>> {
        let payload = json!({
            "attestations": attestations,
            "metadata": metadata,
        });
        canonical_json(&payload).map_err(|e| LedgerError::BundleIncompatible(e.to_string()))
    }
}

/// Export the ledger as a bundle, optionally signed by `signer`.
pub fn export_bundle(
    ledger: &TrustLedger,
    signer: Option<&Identity>,
    metadata: Option<Value>,
) -> Result<Bundle> {
    let attestations: Vec<Value> = ledger.attestations().iter().map(|a| a.to_wire()).collect();
    let metadata = metadata.unwrap_or_else(|| json!({}));

    let mut bundle = Bundle {
        version: BUNDLE_VERSION.to_string(),
        created_at: Utc::now().to_rfc3339(),
        metadata: metadata.clone(),
        attestations,
        stats: ledger.stats(),
        signed_by: None,
        signer_pubkey: None,
        signature: None,
    };

    if let Some(signer) = signer {
        let payload = Bundle::signed_payload(&bundle.attestations, &bundle.metadata)?;
        bundle.signed_by = Some(signer.agent_id());
        bundle.signer_pubkey = Some(signer.public_key_hex());
        bundle.signature = Some(signer.sign_hex(&payload));
    }

    info!(
        count = bundle.stats.count,
        signed = bundle.signature.is_some(),
        "Bundle exported"
    );
    Ok(bundle)
}

/// Import a bundle into a fresh in-memory ledger.
///
/// Fails with [`LedgerError::BundleIncompatible`] on an unknown version or
/// a bad envelope signature (when `verify_signature` is set). Individual
/// attestations that fail verification are skipped with a warning.
pub fn from_bundle(bundle: &Bundle, verify_signature: bool) -> Result<TrustLedger> {
    if bundle.version != BUNDLE_VERSION {
        return Err(LedgerError::BundleIncompatible(format!(
            "unsupported bundle version: {}",
            bundle.version
        )));
    }

    if verify_signature {
        if let Some(signature) = &bundle.signature {
            let signer_pubkey = bundle.signer_pubkey.as_deref().ok_or_else(|| {
                LedgerError::BundleIncompatible("bundle signed but missing signer_pubkey".into())
            })?;
            let payload = Bundle::signed_payload(&bundle.attestations, &bundle.metadata)?;
            if !verify_hex(signer_pubkey, &payload, signature) {
                return Err(LedgerError::BundleIncompatible(
                    "bundle signature verification failed".into(),
                ));
            }
        }
    }

    let mut ledger = TrustLedger::in_memory();
    let mut skipped = 0usize;
    for record in &bundle.attestations {
        let attestation: Attestation = match serde_json::from_value(record.clone()) {
            Ok(attestation) => attestation,
            Err(_) => {
                skipped += 1;
                continue;
            }
        };
        if !attestation.verify() {
            skipped += 1;
            continue;
        }
        if !ledger.add(attestation)? {
            skipped += 1;
        }
    }

    if skipped > 0 {
        warn!(skipped = skipped, "Bundle import skipped records");
    }
    Ok(ledger)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_ledger() -> (TrustLedger, Identity, Identity) {
        let mut ledger = TrustLedger::in_memory();
        let alice = Identity::generate();
        let bob = Identity::generate();
        ledger
            .add(Attestation::create(&alice, &bob.agent_id(), "code-review", ""))
            .unwrap();
        ledger
            .add(Attestation::create(&alice, &bob.agent_id(), "deploy", ""))
            .unwrap();
        (ledger, alice, bob)
    }

    #[test]
    fn test_roundtrip_preserves_ids() {
        let (ledger, _, _) = seeded_ledger();
        let bundle = export_bundle(&ledger, None, None).unwrap();
        let imported = from_bundle(&bundle, true).unwrap();

        let original_ids: std::collections::HashSet<String> = ledger
            .attestations()
            .iter()
            .map(|a| a.attestation_id())
            .collect();
        let imported_ids: std::collections::HashSet<String> = imported
            .attestations()
            .iter()
            .map(|a| a.attestation_id())
            .collect();
        assert_eq!(original_ids, imported_ids);
    }

    #[test]
    fn test_signed_bundle_verifies() {
        let (ledger, alice, _) = seeded_ledger();
        let bundle = export_bundle(&ledger, Some(&alice), None).unwrap();

        assert_eq!(bundle.signed_by.as_deref(), Some(alice.agent_id().as_str()));
        assert!(from_bundle(&bundle, true).is_ok());
    }

    #[test]
    fn test_tampered_bundle_rejected() {
        let (ledger, alice, _) = seeded_ledger();
        let mut bundle = export_bundle(&ledger, Some(&alice), None).unwrap();
        bundle.attestations[0]["task"] = json!("TAMPERED");

        let result = from_bundle(&bundle, true);
        assert!(matches!(result, Err(LedgerError::BundleIncompatible(_))));
    }

    #[test]
    fn test_tampered_unsigned_records_skipped() {
        let (ledger, _, _) = seeded_ledger();
        let mut bundle = export_bundle(&ledger, None, None).unwrap();
        bundle.attestations[0]["task"] = json!("TAMPERED");

        // No envelope signature: the bad record is dropped, the rest import.
        let imported = from_bundle(&bundle, true).unwrap();
        assert_eq!(imported.len(), 1);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let (ledger, _, _) = seeded_ledger();
        let mut bundle = export_bundle(&ledger, None, None).unwrap();
        bundle.version = "isnad-bundle/v9".into();

        assert!(matches!(
            from_bundle(&bundle, true),
            Err(LedgerError::BundleIncompatible(_))
        ));
    }

    #[test]
    fn test_signed_without_pubkey_rejected() {
        let (ledger, alice, _) = seeded_ledger();
        let mut bundle = export_bundle(&ledger, Some(&alice), None).unwrap();
        bundle.signer_pubkey = None;

        assert!(matches!(
            from_bundle(&bundle, true),
            Err(LedgerError::BundleIncompatible(_))
        ));
    }

    #[test]
    fn test_metadata_is_covered_by_signature() {
        let (ledger, alice, _) = seeded_ledger();
        let mut bundle =
            export_bundle(&ledger, Some(&alice), Some(json!({"origin": "node-1"}))).unwrap();
        bundle.metadata = json!({"origin": "node-2"});

        assert!(matches!(
            from_bundle(&bundle, true),
            Err(LedgerError::BundleIncompatible(_))
        ));
    }

    #[test]
    fn test_stats_not_covered_by_signature() {
        let (ledger, alice, _) = seeded_ledger();
        let mut bundle = export_bundle(&ledger, Some(&alice), None).unwrap();
        bundle.stats.count = 999;
        bundle.created_at = "2020-01-01T00:00:00+00:00".into();

        assert!(from_bundle(&bundle, true).is_ok());
    }
}
