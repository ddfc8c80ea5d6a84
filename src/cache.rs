//! Decision and payload caches.
//!
//! The decision cache short-circuits rule evaluation for header sets
//! the engine has already seen; the payload cache holds response file
//! bytes so each file is read from disk at most once.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

use crate::error::PayloadError;

/// Build the cache key for a header set.
///
/// Pairs are sorted by header name before joining, so two maps with the
/// same entries always produce the same key regardless of iteration
/// order.
pub fn decision_key(headers: &HashMap<String, String>) -> String {
    let mut names: Vec<&str> = headers.keys().map(String::as_str).collect();
    names.sort_unstable();

    let capacity = headers
        .iter()
        .map(|(k, v)| k.len() + v.len() + 2)
        .sum::<usize>();
    let mut key = String::with_capacity(capacity);
    for name in names {
        if !key.is_empty() {
            key.push('&');
        }
        key.push_str(name);
        key.push('=');
        if let Some(value) = headers.get(name) {
            key.push_str(value);
        }
    }
    key
}

/// Bounded map from header signature to winning response identifiers.
///
/// Entries are evicted when the cache exceeds its capacity. Winner sets
/// are shared behind `Arc` so hits hand out cheap clones.
pub struct DecisionCache {
    inner: moka::sync::Cache<String, Arc<[String]>>,
    capacity: u64,
}

impl DecisionCache {
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: moka::sync::Cache::builder().max_capacity(capacity).build(),
            capacity,
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<[String]>> {
        self.inner.get(key)
    }

    /// Store a winner set.
    ///
    /// Capacity zero disables the cache outright instead of relying on
    /// immediate eviction.
    pub fn insert(&self, key: String, responses: Arc<[String]>) {
        if self.capacity == 0 {
            return;
        }
        self.inner.insert(key, responses);
    }
}

/// Lazily populated map from response identifier to file bytes.
///
/// Identifiers resolve to paths under a fixed root directory. Once
/// loaded, bytes stay cached for the life of the process; there is no
/// invalidation, so editing a payload file requires a restart.
pub struct PayloadCache {
    root: PathBuf,
    loaded: DashMap<String, Bytes>,
}

impl PayloadCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            loaded: DashMap::new(),
        }
    }

    /// Fetch the bytes behind a response identifier, reading the file
    /// on first use.
    pub async fn resolve(&self, id: &str) -> Result<Bytes, PayloadError> {
        if let Some(bytes) = self.loaded.get(id) {
            return Ok(bytes.value().clone());
        }

        let raw = tokio::fs::read(self.root.join(id))
            .await
            .map_err(|source| PayloadError::NotFound {
                id: id.to_string(),
                source,
            })?;
        let bytes = Bytes::from(raw);
        debug!(id = %id, size = bytes.len(), "Payload loaded");
        self.loaded.insert(id.to_string(), bytes.clone());
        Ok(bytes)
    }

    /// Number of payloads currently resident.
    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_decision_key_is_sorted() {
        assert_eq!(decision_key(&headers(&[("b", "2"), ("a", "1")])), "a=1&b=2");
        assert_eq!(decision_key(&headers(&[("a", "1"), ("b", "2")])), "a=1&b=2");
    }

    #[test]
    fn test_decision_key_same_entries_same_key() {
        let mut forward = HashMap::new();
        forward.insert("x-tenant".to_string(), "acme".to_string());
        forward.insert("user-agent".to_string(), "curl/8".to_string());
        forward.insert("accept".to_string(), "application/json".to_string());

        let mut reverse = HashMap::new();
        reverse.insert("accept".to_string(), "application/json".to_string());
        reverse.insert("user-agent".to_string(), "curl/8".to_string());
        reverse.insert("x-tenant".to_string(), "acme".to_string());

        assert_eq!(decision_key(&forward), decision_key(&reverse));
    }

    #[test]
    fn test_decision_key_empty_headers() {
        assert_eq!(decision_key(&HashMap::new()), "");
    }

    #[test]
    fn test_decision_cache_round_trip() {
        let cache = DecisionCache::new(16);
        let winners: Arc<[String]> = Arc::from(vec!["a.json".to_string()]);
        cache.insert("a=1".to_string(), Arc::clone(&winners));
        let hit = cache.get("a=1").unwrap();
        assert_eq!(hit.as_ref(), winners.as_ref());
        assert!(cache.get("b=2").is_none());
    }

    #[test]
    fn test_decision_cache_capacity_zero_disables() {
        let cache = DecisionCache::new(0);
        cache.insert("a=1".to_string(), Arc::from(vec!["a.json".to_string()]));
        assert!(cache.get("a=1").is_none());
    }

    #[tokio::test]
    async fn test_payload_resolve_reads_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.json"), br#"{"msg":"hello"}"#).unwrap();

        let cache = PayloadCache::new(dir.path());
        let first = cache.resolve("hello.json").await.unwrap();
        assert_eq!(first.as_ref(), br#"{"msg":"hello"}"#);
        assert_eq!(cache.len(), 1);

        // Rewriting the file does not change what a cached identifier serves.
        std::fs::write(dir.path().join("hello.json"), br#"{"msg":"changed"}"#).unwrap();
        let second = cache.resolve("hello.json").await.unwrap();
        assert_eq!(second.as_ref(), br#"{"msg":"hello"}"#);
    }

    #[tokio::test]
    async fn test_payload_resolve_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PayloadCache::new(dir.path());
        let err = cache.resolve("missing.json").await.unwrap_err();
        match err {
            PayloadError::NotFound { id, .. } => assert_eq!(id, "missing.json"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_payload_resolve_nested_identifier() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("responses")).unwrap();
        std::fs::write(dir.path().join("responses/a.json"), b"{}").unwrap();

        let cache = PayloadCache::new(dir.path());
        let bytes = cache.resolve("responses/a.json").await.unwrap();
        assert_eq!(bytes.as_ref(), b"{}");
    }

    #[tokio::test]
    async fn test_payload_concurrent_resolves() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("shared.json"), b"{\"n\":1}").unwrap();

        let cache = Arc::new(PayloadCache::new(dir.path()));
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            tasks.push(tokio::spawn(async move {
                cache.resolve("shared.json").await.unwrap()
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().as_ref(), b"{\"n\":1}");
        }
        assert_eq!(cache.len(), 1);
    }
}
