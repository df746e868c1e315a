//! Delegation records.
//!
//! A delegation is a signed capability grant: a principal hands a delegate
//! authority over a set of task scopes, optionally time-bounded, with an
//! explicit budget for further sub-delegation. Sub-delegations can only
//! narrow: fewer scopes, earlier expiry, less remaining depth.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{DomainError, Result};
use crate::unix_now;
use isnad_crypto::{canonical_json, content_id, verify_hex};
use isnad_identity::Identity;

/// A signed capability grant from `principal` to `delegate`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delegation {
    /// Who grants authority.
    pub principal: String,
    /// Who receives authority.
    pub delegate: String,
    /// Allowed task scopes, kept sorted.
    pub scopes: Vec<String>,
    /// Unix seconds; None means no expiry.
    #[serde(default)]
    pub expires_at: Option<f64>,
    /// How many further sub-delegation levels are allowed below this one.
    pub max_depth: u32,
    /// Id of the granting delegation when sub-delegated.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Depth in the delegation chain, 0 at the root.
    #[serde(default)]
    pub depth: u32,
    /// Unix seconds, set at creation.
    pub timestamp: f64,
    /// Hex signature by the principal over the canonical payload.
    #[serde(default)]
    pub signature: String,
    /// Principal's hex-encoded public key.
    #[serde(default)]
    pub principal_pubkey: String,
}

impl Delegation {
    /// Create and sign a root delegation.
    pub fn create(
        principal: &Identity,
        delegate: &str,
        scopes: Vec<String>,
        expires_at: Option<f64>,
        max_depth: u32,
    ) -> Result<Self> {
        if scopes.is_empty() {
            return Err(DomainError::SchemaViolation(
                "delegation requires at least one scope".to_string(),
            ));
        }
        let mut sorted_scopes = scopes;
        sorted_scopes.sort();
        sorted_scopes.dedup();

        let mut delegation = Self {
            principal: principal.agent_id(),
            delegate: delegate.to_string(),
            scopes: sorted_scopes,
            expires_at,
            max_depth,
            parent_id: None,
            depth: 0,
            timestamp: unix_now(),
            signature: String::new(),
            principal_pubkey: String::new(),
        };
        delegation.signature = principal.sign_hex(&delegation.payload());
        delegation.principal_pubkey = principal.public_key_hex();
        Ok(delegation)
    }

    /// Canonical bytes that get signed and hashed.
    pub fn payload(&self) -> Vec<u8> {
        let data = json!({
            "action": "delegate",
            "principal": self.principal,
            "delegate": self.delegate,
            "scopes": self.scopes,
            "expires_at": self.expires_at,
            "max_depth": self.max_depth,
            "parent_id": self.parent_id,
            "depth": self.depth,
            "timestamp": self.timestamp,
        });
        canonical_json(&data).expect("delegation payload is plain JSON")
    }

    /// Content-derived identifier.
    pub fn delegation_id(&self) -> String {
        content_id(&self.payload())
    }

    /// Verify the principal's signature over the canonical payload.
    pub fn verify(&self) -> bool {
        if self.signature.is_empty() || self.principal_pubkey.is_empty() {
            return false;
        }
        verify_hex(&self.principal_pubkey, &self.payload(), &self.signature)
    }

    pub fn is_expired(&self, now: f64) -> bool {
        match self.expires_at {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }

    /// Whether this delegation has sub-delegation budget left.
    pub fn can_sub_delegate(&self) -> bool {
        self.depth < self.max_depth
    }

    /// Create a sub-delegation of this grant.
    ///
    /// Constraints enforced:
    /// - `signer` must be the delegate of this delegation
    /// - child depth must stay below this delegation's `max_depth`
    /// - child scopes must be a subset of this delegation's scopes
    /// - child expiry cannot exceed this delegation's expiry
    /// - child `max_depth` is capped at the remaining budget
    pub fn sub_delegate(
        &self,
        signer: &Identity,
        new_delegate: &str,
        scopes: Vec<String>,
        expires_at: Option<f64>,
        max_depth: Option<u32>,
    ) -> Result<Delegation> {
        if !self.can_sub_delegate() {
            return Err(DomainError::DelegationConstraint(
                "delegation depth limit reached".to_string(),
            ));
        }
        if signer.agent_id() != self.delegate {
            return Err(DomainError::DelegationConstraint(format!(
                "only delegate {} can sub-delegate",
                self.delegate
            )));
        }
        if scopes.is_empty() {
            return Err(DomainError::SchemaViolation(
                "delegation requires at least one scope".to_string(),
            ));
        }

        let invalid: Vec<&String> = scopes
            .iter()
            .filter(|s| !self.scopes.contains(s))
            .collect();
        if !invalid.is_empty() {
            return Err(DomainError::DelegationConstraint(format!(
                "scopes {:?} not in parent delegation",
                invalid
            )));
        }

        // Child expiry cannot outlive the parent.
        let child_expires = match (self.expires_at, expires_at) {
            (Some(parent), Some(child)) => Some(child.min(parent)),
            (Some(parent), None) => Some(parent),
            (None, child) => child,
        };

        // Remaining depth budget below the child.
        let budget = self.max_depth - self.depth - 1;
        let child_max_depth = max_depth.unwrap_or(budget).min(budget);

        let mut sorted_scopes = scopes;
        sorted_scopes.sort();
        sorted_scopes.dedup();

        let mut child = Delegation {
            principal: self.delegate.clone(),
            delegate: new_delegate.to_string(),
            scopes: sorted_scopes,
            expires_at: child_expires,
            max_depth: child_max_depth,
            parent_id: Some(self.delegation_id()),
            depth: self.depth + 1,
            timestamp: unix_now(),
            signature: String::new(),
            principal_pubkey: String::new(),
        };
        child.signature = signer.sign_hex(&child.payload());
        child.principal_pubkey = signer.public_key_hex();
        Ok(child)
    }
}
