//! Canonical JSON serialization.
//!
//! Every hashed payload in the chain goes through this writer: UTF-8,
//! object keys sorted lexicographically, no whitespace, numbers in
//! their shortest exact decimal form, arrays in input order. Hashing
//! any other serialization of the same value produces a different
//! digest and breaks chain verification.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::CryptoError;

/// Serialize a value to its canonical JSON string.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, CryptoError> {
    let value = serde_json::to_value(value)
        .map_err(|e| CryptoError::Serialization(e.to_string()))?;
    let mut out = String::new();
    write_value(&value, &mut out);
    Ok(out)
}

/// SHA-256 of the canonical JSON of a value, as lowercase hex.
pub fn hash_canonical<T: Serialize>(value: &T) -> Result<String, CryptoError> {
    Ok(sha256_hex(canonical_json(value)?.as_bytes()))
}

/// Lowercase hex SHA-256 digest of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        // serde_json renders scalars compactly: shortest-form numbers
        // via ryu/itoa, escaped strings, bare literals.
        other => out.push_str(&other.to_string()),
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push_str(&Value::String(s.to_string()).to_string());
}
