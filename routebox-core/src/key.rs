//! Cache key types and derivation.
//!
//! A [`CacheKey`] is the namespaced SHA-256 digest of a request body:
//! `{namespace}:{hex digest}`.
//!
//! ```
//! use routebox_core::KeyDeriver;
//! use serde_json::json;
//!
//! let deriver = KeyDeriver::new("vroom");
//! let key = deriver.derive(&json!({"jobs": [], "vehicles": []})).unwrap();
//!
//! assert!(key.as_str().starts_with("vroom:"));
//! assert_eq!(key.digest().len(), 64);
//! ```
//!
//! ## Key modes
//!
//! In [`KeyMode::Strict`] the body is hashed exactly as it serializes, so
//! object field order matters: `{"a":1,"b":2}` and `{"b":2,"a":1}` produce
//! different keys. [`KeyMode::Canonical`] sorts object fields recursively
//! before hashing so both produce the same key.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use smol_str::SmolStr;
use thiserror::Error;

/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "vroom";

/// A cache key identifying a cached optimization result.
///
/// Keys are cheap to clone: the namespace and digest together fit a single
/// [`SmolStr`] allocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(SmolStr);

impl CacheKey {
    /// Creates a key from a namespace and a hex digest.
    pub fn new(namespace: &str, digest: &str) -> Self {
        Self(SmolStr::from(format!("{namespace}:{digest}")))
    }

    /// Returns the full key as stored in the cache.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the namespace part of the key.
    pub fn namespace(&self) -> &str {
        self.0.split_once(':').map_or("", |(namespace, _)| namespace)
    }

    /// Returns the hex digest part of the key.
    pub fn digest(&self) -> &str {
        self.0
            .split_once(':')
            .map_or(self.0.as_str(), |(_, digest)| digest)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// How request bodies are turned into bytes before hashing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// Hash the body as serialized, field order included.
    #[default]
    Strict,
    /// Recursively sort object fields before hashing.
    Canonical,
}

/// Failure to serialize a request body for hashing.
#[derive(Debug, Error)]
#[error("failed to serialize request body for cache key: {0}")]
pub struct KeyError(#[from] serde_json::Error);

/// Derives [`CacheKey`]s from request bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDeriver {
    namespace: SmolStr,
    mode: KeyMode,
}

impl Default for KeyDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl KeyDeriver {
    /// Creates a strict-mode deriver for the given namespace.
    pub fn new(namespace: impl Into<SmolStr>) -> Self {
        Self {
            namespace: namespace.into(),
            mode: KeyMode::Strict,
        }
    }

    /// Sets the key mode.
    #[must_use]
    pub fn mode(mut self, mode: KeyMode) -> Self {
        self.mode = mode;
        self
    }

    /// Returns the configured namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the configured key mode.
    pub fn key_mode(&self) -> KeyMode {
        self.mode
    }

    /// Derives the key for a request body.
    ///
    /// Pure function of the body's serialized bytes (or of its canonical form
    /// in [`KeyMode::Canonical`]).
    pub fn derive<T>(&self, body: &T) -> Result<CacheKey, KeyError>
    where
        T: Serialize + ?Sized,
    {
        let bytes = match self.mode {
            KeyMode::Strict => serde_json::to_vec(body)?,
            KeyMode::Canonical => serde_json::to_vec(&canonicalize(serde_json::to_value(body)?))?,
        };
        Ok(self.derive_bytes(&bytes))
    }

    /// Derives the key for an already serialized body.
    pub fn derive_bytes(&self, bytes: &[u8]) -> CacheKey {
        let digest = Sha256::digest(bytes);
        CacheKey::new(&self.namespace, &hex::encode(digest))
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|(left, _), (right, _)| left.cmp(right));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, canonicalize(value)))
                    .collect::<Map<String, Value>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_bodies_share_a_key() {
        let deriver = KeyDeriver::default();
        let body = json!({"jobs": [{"id": 1, "location": [0, 0]}], "vehicles": [{"id": 1, "start": [0, 0]}]});

        let first = deriver.derive(&body).unwrap();
        let second = deriver.derive(&body.clone()).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.namespace(), "vroom");
    }

    #[test]
    fn different_bodies_produce_different_keys() {
        let deriver = KeyDeriver::default();

        let first = deriver.derive(&json!({"jobs": [{"id": 1}]})).unwrap();
        let second = deriver.derive(&json!({"jobs": [{"id": 2}]})).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn strict_mode_is_sensitive_to_field_order() {
        let deriver = KeyDeriver::default();
        let ab: Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        let ba: Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();

        assert_ne!(deriver.derive(&ab).unwrap(), deriver.derive(&ba).unwrap());
    }

    #[test]
    fn canonical_mode_ignores_field_order() {
        let deriver = KeyDeriver::default().mode(KeyMode::Canonical);
        let ab: Value = serde_json::from_str(r#"{"a":{"x":1,"y":[{"q":1,"p":2}]},"b":2}"#).unwrap();
        let ba: Value = serde_json::from_str(r#"{"b":2,"a":{"y":[{"p":2,"q":1}],"x":1}}"#).unwrap();

        assert_eq!(deriver.derive(&ab).unwrap(), deriver.derive(&ba).unwrap());
    }

    #[test]
    fn canonical_mode_keeps_array_order() {
        let deriver = KeyDeriver::default().mode(KeyMode::Canonical);

        let first = deriver.derive(&json!([1, 2])).unwrap();
        let second = deriver.derive(&json!([2, 1])).unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn key_matches_sha256_of_serialized_body() {
        let deriver = KeyDeriver::new("ns");
        let key = deriver.derive_bytes(b"{}");

        assert_eq!(
            key.as_str(),
            "ns:44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
        assert_eq!(key, deriver.derive(&json!({})).unwrap());
    }
}
