//! Cache capability shared by both cache tiers.

use async_trait::async_trait;

/// Key/value cache for short URL → long URL mappings.
///
/// There is no error channel: implementations degrade failures
/// to a miss (`get`) or a silent no-op (`set`).
///
/// # Implementations
///
/// - [`crate::infrastructure::cache::LocalCache`] - in-process LRU + TTL cache
/// - [`crate::infrastructure::cache::RedisCache`] - shared Redis-backed cache
/// - [`crate::infrastructure::cache::NullCache`] - no-op for disabled caching
#[async_trait]
pub trait CacheService: Send + Sync {
    /// Returns the cached long URL, or `None` on miss or failure.
    async fn get(&self, short_url: &str) -> Option<String>;

    /// Stores a mapping. Failures are logged and swallowed.
    async fn set(&self, short_url: &str, long_url: &str);

    /// Reports backend liveness for the health endpoint.
    async fn health_check(&self) -> bool {
        true
    }

    /// Human-readable backend name used in logs and health output.
    fn name(&self) -> &'static str;
}
