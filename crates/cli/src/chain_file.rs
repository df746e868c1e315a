//! Chain and revocation list files.
//!
//! A chain file is a JSON array of attestation envelopes; a revocation
//! list is a JSON array of revocation records. Loading a chain re-verifies
//! every record through normal ledger admission and warns about skips.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::warn;

use isnad_domain::{Attestation, Revocation};
use isnad_ledger::TrustLedger;

/// Load a chain file into an in-memory ledger.
pub fn load_chain(path: &Path) -> Result<TrustLedger> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let records: Vec<Value> =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;

    let mut ledger = TrustLedger::in_memory();
    let mut skipped = 0usize;
    for record in records {
        match serde_json::from_value::<Attestation>(record) {
            Ok(attestation) => {
                if !ledger.add(attestation)? {
                    skipped += 1;
                }
            }
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(path = %path.display(), skipped = skipped, "Chain file entries skipped");
    }
    Ok(ledger)
}

/// Load a revocation list, tolerating a missing file.
pub fn load_revocations(path: &Path) -> Result<Vec<Revocation>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

/// Write a revocation list.
pub fn save_revocations(path: &Path, entries: &[Revocation]) -> Result<()> {
    std::fs::write(path, serde_json::to_string_pretty(entries)?)
        .with_context(|| format!("writing {}", path.display()))
}
