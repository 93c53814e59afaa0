//! Idempotency Registry domain types and the canonical body-hash rule.
//!
//! Canonicalization (Open Question, decided): object keys are sorted
//! recursively and the result is serialized compactly, so field ordering
//! and incidental whitespace in the wire form never change the hash.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// A 32-byte digest over the canonicalized request body.
pub type BodyHash = [u8; 32];

/// Recursively sorts all JSON object keys so two semantically-identical
/// payloads with different field order serialize to the same bytes.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(String, Value)> = map
                .iter()
                .map(|(k, v)| (k.clone(), canonicalize(v)))
                .collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Hashes the canonical byte representation of a request body.
pub fn hash_body(value: &Value) -> BodyHash {
    let canonical = canonicalize(value);
    // serde_json::Value serializes maps (now a Vec-backed ordered object
    // after canonicalize) in insertion order, which is now key-sorted.
    let bytes = serde_json::to_vec(&canonical).expect("canonical value is always serializable");
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hasher.finalize().into()
}

/// Outcome of `IdempotencyRegistry::begin`.
#[derive(Debug, Clone)]
pub enum IdemOutcome {
    /// No prior record; the caller reserved the key and should proceed.
    Fresh,
    /// A prior record with a matching body hash exists; return it verbatim.
    ReplayOf {
        status_code: u16,
        response: Value,
    },
    /// A prior record with a different body hash exists.
    Conflict,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_order_does_not_change_hash() {
        let a = json!({"b": 1, "a": 2, "c": {"y": 1, "x": 2}});
        let b = json!({"a": 2, "c": {"x": 2, "y": 1}, "b": 1});
        assert_eq!(hash_body(&a), hash_body(&b));
    }

    #[test]
    fn different_values_hash_differently() {
        let a = json!({"duration_sec": 120});
        let b = json!({"duration_sec": 121});
        assert_ne!(hash_body(&a), hash_body(&b));
    }

    #[test]
    fn array_order_is_significant() {
        let a = json!({"segments": [1, 2]});
        let b = json!({"segments": [2, 1]});
        assert_ne!(hash_body(&a), hash_body(&b));
    }
}
