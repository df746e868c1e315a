//! Keypair holder and agent-id derivation.

use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use zeroize::Zeroize;

use crate::error::{IdentityError, Result};
use crate::rotation::KeyRotation;
use isnad_crypto::canonical::ID_HEX_LEN;
use isnad_crypto::sha256_hex;

/// Derive an agent identifier from a hex-encoded Ed25519 public key.
///
/// The digest is computed over the hex *string*, matching the wire format
/// every peer sees, so derivation never depends on a local byte encoding.
pub fn derive_agent_id(public_key_hex: &str) -> String {
    let digest = sha256_hex(public_key_hex.as_bytes());
    format!("agent:{}", &digest[..ID_HEX_LEN])
}

/// On-disk identity file: `{agent_id, public_key, private_key, created_at}`.
///
/// This is the only place the private seed ever leaves the [`Identity`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityFile {
    pub agent_id: String,
    pub public_key: String,
    pub private_key: String,
    pub created_at: String,
}

/// An agent's Ed25519 keypair.
///
/// The signing seed is held privately; it is exported only through
/// [`Identity::export`] / [`Identity::save`].
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut seed);
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Self { signing_key }
    }

    /// Reconstruct an identity from a hex-encoded 32-byte seed.
    pub fn from_seed_hex(seed_hex: &str) -> Result<Self> {
        let bytes = hex::decode(seed_hex)
            .map_err(|e| IdentityError::InvalidKey(format!("seed is not hex: {}", e)))?;
        if bytes.len() != 32 {
            return Err(IdentityError::InvalidKey(format!(
                "seed length {} (expected 32)",
                bytes.len()
            )));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes);
        let signing_key = SigningKey::from_bytes(&seed);
        seed.zeroize();
        Ok(Self { signing_key })
    }

    /// Derived agent identifier.
    pub fn agent_id(&self) -> String {
        derive_agent_id(&self.public_key_hex())
    }

    /// Hex-encoded 32-byte verify key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign arbitrary bytes (normally a canonical JSON payload).
    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }

    /// Sign and return the signature as lowercase hex.
    pub fn sign_hex(&self, message: &[u8]) -> String {
        hex::encode(self.sign(message))
    }

    /// Export the full keypair, private seed included.
    pub fn export(&self) -> IdentityFile {
        IdentityFile {
            agent_id: self.agent_id(),
            public_key: self.public_key_hex(),
            private_key: hex::encode(self.signing_key.to_bytes()),
            created_at: Utc::now().to_rfc3339(),
        }
    }

    /// Save the identity file with owner-only permissions.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.export())?;
        std::fs::write(path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        info!(path = %path.display(), agent_id = %self.agent_id(), "Identity saved");
        Ok(())
    }

    /// Load an identity from a file written by [`Identity::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let file: IdentityFile = serde_json::from_str(&content)?;
        Self::from_seed_hex(&file.private_key)
    }

    /// Rotate to a fresh keypair.
    ///
    /// Returns the new identity together with a rotation record signed by
    /// the *old* key, proving the holder authorised the transition.
    pub fn rotate(&self) -> (Identity, KeyRotation) {
        let new_identity = Identity::generate();
        let rotation = KeyRotation::create(self, &new_identity);
        (new_identity, rotation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_is_derived_from_public_key() {
        let identity = Identity::generate();
        let agent_id = identity.agent_id();
        assert!(agent_id.starts_with("agent:"));
        assert_eq!(agent_id.len(), "agent:".len() + 16);
        assert_eq!(agent_id, derive_agent_id(&identity.public_key_hex()));
    }

    #[test]
    fn test_distinct_keys_distinct_ids() {
        let a = Identity::generate();
        let b = Identity::generate();
        assert_ne!(a.agent_id(), b.agent_id());
    }

    #[test]
    fn test_from_seed_hex_roundtrip() {
        let identity = Identity::generate();
        let exported = identity.export();
        let restored = Identity::from_seed_hex(&exported.private_key).unwrap();
        assert_eq!(restored.agent_id(), identity.agent_id());
        assert_eq!(restored.public_key_hex(), identity.public_key_hex());
    }

    #[test]
    fn test_from_seed_hex_rejects_bad_input() {
        assert!(Identity::from_seed_hex("not hex").is_err());
        assert!(Identity::from_seed_hex("abcd").is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");

        let identity = Identity::generate();
        identity.save(&path).unwrap();

        let loaded = Identity::load(&path).unwrap();
        assert_eq!(loaded.agent_id(), identity.agent_id());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_sign_verifies_with_public_key() {
        let identity = Identity::generate();
        let signature = identity.sign(b"payload");
        assert!(isnad_crypto::verify_hex(
            &identity.public_key_hex(),
            b"payload",
            &hex::encode(signature)
        ));
    }

    #[test]
    fn test_rotate_produces_valid_record() {
        let old = Identity::generate();
        let (new, rotation) = old.rotate();

        assert_ne!(old.agent_id(), new.agent_id());
        assert!(rotation.verify());
        assert_eq!(rotation.old_agent_id, old.agent_id());
        assert_eq!(rotation.new_agent_id, new.agent_id());
    }
}
