//! In-memory recognition cache
//!
//! Fronts the recognition pipeline with a TTL'd moka cache keyed by file
//! content hash. A hit returns the stored `RecognitionResult` unchanged,
//! which is what makes repeat recognitions byte-identical inside the TTL.

use std::time::Duration;

use moka::future::Cache;

use crate::models::RecognitionResult;

use super::key_builder::KeyBuilder;

/// Default TTL for cached recognition results
pub const DEFAULT_TTL_HOURS: u64 = 24;

/// TTL-bound cache of recognition results
#[derive(Clone)]
pub struct RecognitionCache {
    cache: Cache<String, RecognitionResult>,
}

impl RecognitionCache {
    /// Build a cache holding up to `max_capacity` results for `ttl`
    #[must_use]
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(10_000, Duration::from_secs(DEFAULT_TTL_HOURS * 3600))
    }

    pub async fn get(&self, key: &str) -> Option<RecognitionResult> {
        self.cache.get(key).await
    }

    pub async fn insert(&self, key: String, result: RecognitionResult) {
        self.cache.insert(key, result).await;
    }

    pub async fn invalidate(&self, key: &str) {
        self.cache.invalidate(key).await;
    }

    /// Entry count; moka maintains this lazily, so treat as approximate
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl std::fmt::Debug for RecognitionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;

    fn result(title: &str) -> RecognitionResult {
        let mut r = RecognitionResult::new(MediaType::Movie, title, "test");
        r.confidence = 0.9;
        r
    }

    #[tokio::test]
    async fn test_hit_returns_identical_result() {
        let cache = RecognitionCache::with_defaults();
        let kb = KeyBuilder::default();
        let key = kb.recognition("hash-1", Some("movie"));

        let stored = result("The Matrix");
        cache.insert(key.clone(), stored.clone()).await;

        let hit = cache.get(&key).await.unwrap();
        assert_eq!(
            serde_json::to_string(&hit).unwrap(),
            serde_json::to_string(&stored).unwrap()
        );
    }

    #[tokio::test]
    async fn test_miss_returns_none() {
        let cache = RecognitionCache::with_defaults();
        assert!(cache.get("absent").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_is_gone() {
        let cache = RecognitionCache::new(100, Duration::from_millis(20));
        cache.insert("k".to_string(), result("Gone")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_removes_entry() {
        let cache = RecognitionCache::with_defaults();
        cache.insert("k".to_string(), result("Stale")).await;
        cache.invalidate("k").await;
        assert!(cache.get("k").await.is_none());
    }
}
