//! Per-provider-domain rate limiting
//!
//! One token bucket per provider domain, shared by every request going to
//! that domain. Buckets are created lazily and live for the process.

use std::num::NonZeroU32;
use std::sync::Arc;

use dashmap::DashMap;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;

/// Keyed rate limiter with one bucket per provider domain
pub struct ProviderRateLimiter {
    per_second: NonZeroU32,
    buckets: DashMap<String, Arc<DefaultDirectRateLimiter>>,
}

impl ProviderRateLimiter {
    /// Allow `per_second` sustained requests per domain; zero falls back
    /// to one request per second
    #[must_use]
    pub fn new(per_second: u32) -> Self {
        Self {
            per_second: NonZeroU32::new(per_second).unwrap_or(nonzero!(1u32)),
            buckets: DashMap::new(),
        }
    }

    fn bucket(&self, domain: &str) -> Arc<DefaultDirectRateLimiter> {
        self.buckets
            .entry(domain.to_string())
            .or_insert_with(|| {
                Arc::new(RateLimiter::direct(Quota::per_second(self.per_second)))
            })
            .clone()
    }

    /// Wait until a request to `domain` is admissible
    pub async fn acquire(&self, domain: &str) {
        self.bucket(domain).until_ready().await;
    }

    /// Non-blocking probe; true when a request would be admitted now
    #[must_use]
    pub fn try_acquire(&self, domain: &str) -> bool {
        self.bucket(domain).check().is_ok()
    }

    /// Number of domains with an active bucket
    #[must_use]
    pub fn domain_count(&self) -> usize {
        self.buckets.len()
    }
}

impl std::fmt::Debug for ProviderRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRateLimiter")
            .field("per_second", &self.per_second)
            .field("domains", &self.buckets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_is_bounded() {
        let limiter = ProviderRateLimiter::new(2);
        assert!(limiter.try_acquire("api.example.com"));
        assert!(limiter.try_acquire("api.example.com"));
        assert!(!limiter.try_acquire("api.example.com"));
    }

    #[test]
    fn test_domains_are_independent() {
        let limiter = ProviderRateLimiter::new(1);
        assert!(limiter.try_acquire("a.example.com"));
        assert!(!limiter.try_acquire("a.example.com"));
        assert!(limiter.try_acquire("b.example.com"));
        assert_eq!(limiter.domain_count(), 2);
    }

    #[test]
    fn test_zero_rate_falls_back_to_one() {
        let limiter = ProviderRateLimiter::new(0);
        assert!(limiter.try_acquire("a.example.com"));
        assert!(!limiter.try_acquire("a.example.com"));
    }

    #[tokio::test]
    async fn test_acquire_eventually_admits() {
        let limiter = ProviderRateLimiter::new(100);
        limiter.acquire("fast.example.com").await;
        limiter.acquire("fast.example.com").await;
    }
}
