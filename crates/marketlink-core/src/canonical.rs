//! Canonical JSON encoding and payload hashing
//!
//! Change detection compares the payload we would push now against the one
//! we pushed last. Object key order is not significant in JSON, so both
//! sides are canonicalized first: object keys are sorted recursively at
//! every level, arrays keep their element order (element order in the
//! outbound payload is meaningful — image order, attribute index order).
//! The link store keeps only the SHA-256 digest of the canonical form.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serializes a JSON value with recursively sorted object keys
#[must_use]
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// SHA-256 hex digest of the canonical encoding
#[must_use]
pub fn payload_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_string(value).as_bytes());
    let digest = hasher.finalize();

    use std::fmt::Write;

    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        // infallible on String
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // scalars already have a single JSON encoding
        other => {
            out.push_str(&other.to_string());
        }
    }
}

fn write_json_string(s: &str, out: &mut String) {
    // serde_json escapes exactly as the JSON grammar requires
    out.push_str(&Value::String(s.to_string()).to_string());
}
