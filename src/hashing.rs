//! Canonical BLAKE3 content hashing for deterministic module identity.
//!
//! Strategy:
//! 1. Convert a value -> `serde_json::Value`
//! 2. Recursively convert to `CanonicalValue` with `BTreeMap` ordering
//! 3. Serialize `CanonicalValue` -> bytes
//! 4. BLAKE3 hash the bytes
//!
//! Composite hashes (context hashes, type fingerprints) interleave a `\0`
//! separator between components so that adjacent fields cannot collide by
//! concatenation.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::EngineResult;

/// A finalized 256-bit content hash.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HashValue([u8; 32]);

impl HashValue {
    /// The all-zero hash. Transparent and empty inputs contribute this value
    /// to a context hash.
    pub const ZERO: HashValue = HashValue([0u8; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex rendering, used as the cache key form.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(64);
        for byte in self.0 {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }

    /// Parse the 64-char hex form back into a hash.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() != 64 {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (idx, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let text = std::str::from_utf8(chunk).ok()?;
            bytes[idx] = u8::from_str_radix(text, 16).ok()?;
        }
        Some(HashValue(bytes))
    }
}

impl From<[u8; 32]> for HashValue {
    fn from(bytes: [u8; 32]) -> Self {
        HashValue(bytes)
    }
}

impl fmt::Debug for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashValue({})", self.to_hex())
    }
}

impl fmt::Display for HashValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Incremental hasher over primitive and composite values.
///
/// Wraps a BLAKE3 hasher. Strings and hash components are fed with a trailing
/// `\0` separator; serializable values are fed through their canonical JSON
/// byte form so logically-equal values hash equally regardless of in-memory
/// field order.
pub struct ContextHasher {
    inner: blake3::Hasher,
}

impl ContextHasher {
    pub fn new() -> Self {
        ContextHasher {
            inner: blake3::Hasher::new(),
        }
    }

    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
        self.inner.update(b"\0");
    }

    pub fn update_str(&mut self, s: &str) {
        self.update_bytes(s.as_bytes());
    }

    pub fn update_hash(&mut self, hash: &HashValue) {
        self.update_bytes(hash.as_bytes());
    }

    /// Feed a serializable value through its canonical byte form.
    ///
    /// # Errors
    ///
    /// Returns *backend-io* if the value refuses JSON serialization
    /// (e.g. a non-finite float).
    pub fn update_value<T: Serialize + ?Sized>(&mut self, value: &T) -> EngineResult<()> {
        let bytes = canonical_bytes(value)?;
        self.update_bytes(&bytes);
        Ok(())
    }

    pub fn finish(self) -> HashValue {
        HashValue(*self.inner.finalize().as_bytes())
    }
}

impl Default for ContextHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical value representation with sorted object keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum CanonicalValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<CanonicalValue>),
    Object(BTreeMap<String, CanonicalValue>),
}

/// Recursively canonicalize a JSON value to ensure deterministic ordering.
fn canonicalize_value(value: serde_json::Value) -> CanonicalValue {
    match value {
        serde_json::Value::Null => CanonicalValue::Null,
        serde_json::Value::Bool(b) => CanonicalValue::Bool(b),
        serde_json::Value::Number(n) => CanonicalValue::Number(n),
        serde_json::Value::String(s) => CanonicalValue::String(s),
        serde_json::Value::Array(arr) => {
            CanonicalValue::Array(arr.into_iter().map(canonicalize_value).collect())
        }
        serde_json::Value::Object(obj) => {
            let mut canonical_map = BTreeMap::new();
            for (k, v) in obj {
                canonical_map.insert(k, canonicalize_value(v));
            }
            CanonicalValue::Object(canonical_map)
        }
    }
}

/// Canonical byte representation of a serializable value (compact JSON,
/// object keys sorted).
pub fn canonical_bytes<T: Serialize + ?Sized>(value: &T) -> EngineResult<Vec<u8>> {
    let json_value = serde_json::to_value(value)?;
    let canonical = canonicalize_value(json_value);
    Ok(serde_json::to_vec(&canonical)?)
}

/// Hash a single storable value to its content hash.
///
/// Top-level mutability is invisible here: the hash covers the payload only,
/// never the storage discipline holding it.
pub fn hash_object<T: Serialize + ?Sized>(value: &T) -> EngineResult<HashValue> {
    let mut hasher = ContextHasher::new();
    hasher.update_value(value)?;
    Ok(hasher.finish())
}

/// Stable fingerprint for a registered type, derived from its name.
///
/// Fingerprints key the on-disk `uuid/` directory and the codec registry's
/// persistent lookups; they survive process restarts where `TypeId` does not.
pub fn type_fingerprint(type_name: &str) -> HashValue {
    let mut hasher = ContextHasher::new();
    hasher.update_str("sciflow.type");
    hasher.update_str(type_name);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn hash_is_deterministic() {
        let a = hash_object(&42i32).unwrap();
        let b = hash_object(&42i32).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, hash_object(&43i32).unwrap());
    }

    #[test]
    fn map_hash_ignores_insertion_order() {
        let mut forward = HashMap::new();
        forward.insert("a".to_string(), 1);
        forward.insert("b".to_string(), 2);
        let mut reverse = HashMap::new();
        reverse.insert("b".to_string(), 2);
        reverse.insert("a".to_string(), 1);
        assert_eq!(
            hash_object(&forward).unwrap(),
            hash_object(&reverse).unwrap()
        );
    }

    #[test]
    fn separator_prevents_concatenation_collisions() {
        let mut h1 = ContextHasher::new();
        h1.update_str("ab");
        h1.update_str("c");
        let mut h2 = ContextHasher::new();
        h2.update_str("a");
        h2.update_str("bc");
        assert_ne!(h1.finish(), h2.finish());
    }

    #[test]
    fn zero_hash_renders_as_hex() {
        assert_eq!(HashValue::ZERO.to_hex(), "0".repeat(64));
    }

    #[test]
    fn fingerprint_distinguishes_types() {
        assert_ne!(type_fingerprint("i32"), type_fingerprint("i64"));
    }
}
