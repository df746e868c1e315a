//! The storage contract.
//!
//! Records are JSON value snapshots keyed by `(kind, id)`. Inserts are
//! idempotent: re-putting an existing id is a no-op that reports `false`.
//! Secondary indexes map `(kind, index_name, key)` to record ids; a lookup
//! never returns ids whose records have been erased.

use serde_json::Value;

use crate::error::Result;

/// Tag for each record family the ledger persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Attestation,
    Revocation,
    Delegation,
    KeyRotation,
    PlatformDatum,
    Profile,
    TrustCheck,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Attestation => "attestation",
            RecordKind::Revocation => "revocation",
            RecordKind::Delegation => "delegation",
            RecordKind::KeyRotation => "key_rotation",
            RecordKind::PlatformDatum => "platform_datum",
            RecordKind::Profile => "profile",
            RecordKind::TrustCheck => "trust_check",
        }
    }

    pub fn from_str_tag(tag: &str) -> Option<Self> {
        match tag {
            "attestation" => Some(RecordKind::Attestation),
            "revocation" => Some(RecordKind::Revocation),
            "delegation" => Some(RecordKind::Delegation),
            "key_rotation" => Some(RecordKind::KeyRotation),
            "platform_datum" => Some(RecordKind::PlatformDatum),
            "profile" => Some(RecordKind::Profile),
            "trust_check" => Some(RecordKind::TrustCheck),
            _ => None,
        }
    }

    pub fn all() -> [RecordKind; 7] {
        [
            RecordKind::Attestation,
            RecordKind::Revocation,
            RecordKind::Delegation,
            RecordKind::KeyRotation,
            RecordKind::PlatformDatum,
            RecordKind::Profile,
            RecordKind::TrustCheck,
        ]
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields an agent id can appear under; [`StorageBackend::delete_by_agent`]
/// erases every record matching on any of them.
pub const AGENT_FIELDS: [&str; 6] = [
    "subject",
    "witness",
    "principal",
    "delegate",
    "revoked_by",
    "agent_id",
];

/// A keyed record log with secondary scan.
///
/// Implementations must support concurrent readers alongside a single
/// writer; non-memory backends must be durable across restarts.
pub trait StorageBackend: Send + Sync {
    /// Idempotent insert. Returns false (and changes nothing) when the id
    /// already exists under this kind.
    fn put(&self, kind: RecordKind, id: &str, record: &Value) -> Result<bool>;

    /// Replace an existing record in place. Returns false when the id does
    /// not exist. Only mutable record kinds (platform data) use this;
    /// ledger records are append-only.
    fn update(&self, kind: RecordKind, id: &str, record: &Value) -> Result<bool>;

    fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Value>>;

    /// All records of a kind in insertion order.
    fn iter(&self, kind: RecordKind) -> Result<Vec<(String, Value)>>;

    /// Erase every record in which the agent appears as subject, witness,
    /// principal, delegate, revoker, or owner. Returns the number removed.
    fn delete_by_agent(&self, agent_id: &str) -> Result<usize>;

    fn index_add(&self, kind: RecordKind, index_name: &str, key: &str, id: &str) -> Result<()>;

    fn index_lookup(&self, kind: RecordKind, index_name: &str, key: &str) -> Result<Vec<String>>;
}

/// Whether a record mentions the agent in any owning or authoring field.
pub(crate) fn record_mentions_agent(record: &Value, agent_id: &str) -> bool {
    AGENT_FIELDS
        .iter()
        .any(|field| record.get(field).and_then(Value::as_str) == Some(agent_id))
}
