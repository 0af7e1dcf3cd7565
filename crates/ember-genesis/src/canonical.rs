//! Canonical JSON hashing.
//!
//! `serde_json::Value` objects are backed by a sorted map, so serializing
//! one always yields key-sorted JSON. Hashing that serialization gives a
//! representation any peer can reproduce bit-for-bit from the same fields.

use serde_json::Value;

/// Hash a JSON value's canonical (key-sorted) serialization.
pub(crate) fn hash_json(value: &Value) -> String {
    let bytes = serde_json::to_vec(value).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a: Value = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
        assert_eq!(hash_json(&a), hash_json(&b));
    }

    #[test]
    fn values_do_matter() {
        assert_ne!(hash_json(&json!({"a": 1})), hash_json(&json!({"a": 2})));
    }
}
