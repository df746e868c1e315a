//! Canonical JSON and content hashing.
//!
//! Canonical form: object keys sorted by byte order, no whitespace, UTF-8.
//! Two records with the same canonical bytes are the same record, which is
//! what makes content-derived identifiers stable across machines.

use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Number of hex characters kept for content-derived identifiers.
pub const ID_HEX_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum CanonicalError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Value is not representable as canonical JSON: {0}")]
    Unrepresentable(String),
}

pub type Result<T> = std::result::Result<T, CanonicalError>;

/// Serialize a JSON value to canonical bytes.
///
/// Object keys are emitted in sorted order regardless of how the value was
/// built; scalars and strings reuse serde_json's escaping so the output is
/// always valid JSON.
pub fn canonical_json(value: &Value) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(128);
    write_value(&mut out, value)?;
    Ok(out)
}

fn write_value(out: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Object(map) => {
            out.push(b'{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_value(out, &map[key.as_str()])?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(out, item)?;
            }
            out.push(b']');
        }
        Value::Number(n) => {
            // serde_json::Number cannot hold NaN or infinities, but a finite
            // float that serde coerced from a non-finite input arrives as
            // Null, so the only check needed here is representability.
            if n.as_f64().map(|f| !f.is_finite()).unwrap_or(false) {
                return Err(CanonicalError::Unrepresentable(n.to_string()));
            }
            serde_json::to_writer(&mut *out, value)?;
        }
        _ => serde_json::to_writer(&mut *out, value)?,
    }
    Ok(())
}

/// SHA-256 digest as a lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Content-derived identifier: first 16 hex characters of the SHA-256 digest.
pub fn content_id(data: &[u8]) -> String {
    let mut id = sha256_hex(data);
    id.truncate(ID_HEX_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_sorts_keys() {
        let value = json!({"witness": "w", "evidence": "", "subject": "s"});
        let bytes = canonical_json(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"evidence":"","subject":"s","witness":"w"}"#
        );
    }

    #[test]
    fn test_canonical_no_whitespace() {
        let value = json!({"a": [1, 2, 3], "b": {"c": true, "d": null}});
        let bytes = canonical_json(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":[1,2,3],"b":{"c":true,"d":null}}"#
        );
    }

    #[test]
    fn test_canonical_nested_objects_sorted() {
        let value = json!({"z": {"b": 1, "a": 2}, "a": 0});
        let bytes = canonical_json(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":0,"z":{"a":2,"b":1}}"#
        );
    }

    #[test]
    fn test_canonical_deterministic() {
        let a = json!({"x": 1.5, "y": "text", "z": [true]});
        let b = json!({"z": [true], "y": "text", "x": 1.5});
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }

    #[test]
    fn test_canonical_escapes_strings() {
        let value = json!({"msg": "line\nbreak \"quoted\""});
        let bytes = canonical_json(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"msg":"line\nbreak \"quoted\""}"#
        );
    }

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_content_id_is_prefix() {
        let digest = sha256_hex(b"payload");
        assert_eq!(content_id(b"payload"), &digest[..ID_HEX_LEN]);
    }
}
