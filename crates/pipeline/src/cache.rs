//! Refined template-style cache.
//!
//! Turning a project's free-text style into a provider-ready style prompt
//! costs one text-model call. The result is cached per project and input
//! fingerprint for a fixed TTL.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use slidesmith_core::types::DbId;
use tokio::sync::Mutex;

/// TTL map of refined style descriptions.
pub struct StyleCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, (Instant, String)>>,
}

impl StyleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cache key: `{project_id}:{sha256(inputs joined by NUL)}`.
    pub fn key(project_id: DbId, inputs: &[&str]) -> String {
        let hash = Sha256::digest(inputs.join("\0").as_bytes());
        format!("{project_id}:{hash:x}")
    }

    /// Cached value, if present and not expired. Expired entries are removed.
    pub async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((stored_at, value)) if stored_at.elapsed() < self.ttl => Some(value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a value. Every expired entry is purged first, so the map never
    /// holds more than the entries inserted within one TTL.
    pub async fn insert(&self, key: &str, value: String) {
        let ttl = self.ttl;
        let mut entries = self.entries.lock().await;
        entries.retain(|_, (stored_at, _)| stored_at.elapsed() < ttl);
        entries.insert(key.to_string(), (Instant::now(), value));
    }

    /// Return the cached value or compute, store and return a new one.
    /// Errors are not cached.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: &str, compute: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(hit) = self.get(key).await {
            tracing::debug!(key, "Style cache hit");
            return Ok(hit);
        }
        let value = compute().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_scoped_by_project_and_stable() {
        let a = StyleCache::key(7, &["minimal", "blue"]);
        let b = StyleCache::key(7, &["minimal", "blue"]);
        let c = StyleCache::key(8, &["minimal", "blue"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("7:"));
        assert_eq!(a.len(), "7:".len() + 64);
    }

    #[test]
    fn input_boundaries_matter() {
        assert_ne!(StyleCache::key(1, &["ab", "c"]), StyleCache::key(1, &["a", "bc"]));
    }

    #[tokio::test]
    async fn compute_runs_once_while_fresh() {
        let cache = StyleCache::new(Duration::from_secs(60));
        let key = StyleCache::key(1, &["warm"]);
        let mut calls = 0;

        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with(&key, || {
                    calls += 1;
                    async { Ok::<_, std::convert::Infallible>("refined".to_string()) }
                })
                .await
                .unwrap();
            assert_eq!(value, "refined");
        }
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn expired_entries_are_dropped() {
        let cache = StyleCache::new(Duration::ZERO);
        let old = StyleCache::key(1, &["old"]);
        cache.insert(&old, "x".to_string()).await;
        assert_eq!(cache.get(&old).await, None);

        cache.insert(&StyleCache::key(2, &["other"]), "y".to_string()).await;
        cache.insert(&StyleCache::key(1, &["new"]), "z".to_string()).await;
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn insert_purges_expired_entries_of_every_project() {
        let cache = StyleCache::new(Duration::from_millis(1));
        for project_id in 0..100 {
            cache
                .insert(&StyleCache::key(project_id, &["style"]), "v".to_string())
                .await;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;

        cache
            .insert(&StyleCache::key(500, &["style"]), "fresh".to_string())
            .await;
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = StyleCache::new(Duration::from_secs(60));
        let key = StyleCache::key(3, &["x"]);
        let err = cache
            .get_or_try_insert_with(&key, || async { Err::<String, _>("provider down") })
            .await;
        assert_eq!(err, Err("provider down"));
        assert!(cache.is_empty().await);
    }
}
