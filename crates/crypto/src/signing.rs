//! Ed25519 signing and verification.
//!
//! All record types sign canonical JSON bytes with a 32-byte seed and verify
//! against the 32-byte public key, both usually carried as lowercase hex on
//! the wire. Verification never panics and never errors: any malformed key,
//! signature, or payload simply fails to verify.

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroize;

/// Ed25519 signature length in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Ed25519 seed (private key) length in bytes.
pub const SEED_LEN: usize = 32;

/// Ed25519 public key length in bytes.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Sign a message with a raw 32-byte seed.
///
/// The expanded key material is zeroized before returning; the caller keeps
/// ownership of the seed itself.
pub fn sign_with_seed(seed: &[u8; SEED_LEN], message: &[u8]) -> [u8; SIGNATURE_LEN] {
    let mut key_bytes = *seed;
    let signing_key = SigningKey::from_bytes(&key_bytes);
    key_bytes.zeroize();
    signing_key.sign(message).to_bytes()
}

/// Verify a signature against a raw public key.
///
/// Returns false on any malformation (wrong lengths, invalid key encoding)
/// as well as on a genuine signature mismatch.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> bool {
    if public_key.len() != PUBLIC_KEY_LEN || signature.len() != SIGNATURE_LEN {
        return false;
    }
    let mut key_bytes = [0u8; PUBLIC_KEY_LEN];
    key_bytes.copy_from_slice(public_key);
    let verifying_key = match VerifyingKey::from_bytes(&key_bytes) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let signature_bytes: [u8; SIGNATURE_LEN] = match signature.try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = ed25519_dalek::Signature::from_bytes(&signature_bytes);
    verifying_key.verify(message, &signature).is_ok()
}

/// Verify with hex-encoded public key and signature, the wire-level form.
pub fn verify_hex(public_key_hex: &str, message: &[u8], signature_hex: &str) -> bool {
    let public_key = match hex::decode(public_key_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    verify(&public_key, message, &signature)
}
