use anyhow::{Context, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Recursively sort object keys for stable hashing.
pub fn canonical_json(v: serde_json::Value) -> serde_json::Value {
    match v {
        serde_json::Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut new_map = serde_json::Map::new();
            for (k, child) in entries {
                new_map.insert(k, canonical_json(child));
            }
            serde_json::Value::Object(new_map)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(canonical_json).collect())
        }
        other => other,
    }
}

/// sha256 over the key-sorted compact JSON encoding of `value`.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String> {
    let v = serde_json::to_value(value).context("serialize for content hash")?;
    let bytes = serde_json::to_vec(&canonical_json(v)).context("encode canonical json")?;
    Ok(sha256_hex(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_ignores_key_order() {
        let a = json!({"b": 1, "a": {"y": [1, 2], "x": null}});
        let b = json!({"a": {"x": null, "y": [1, 2]}, "b": 1});
        let h = content_hash(&a).unwrap();
        assert_eq!(h, content_hash(&b).unwrap());
        assert_eq!(h.len(), 64);
    }

    #[test]
    fn array_order_is_significant() {
        assert_ne!(content_hash(&json!([1, 2])).unwrap(), content_hash(&json!([2, 1])).unwrap());
    }

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
