//! No-op cache implementation for disabled caching.

use super::service::CacheService;
use async_trait::async_trait;
use tracing::debug;

/// A cache implementation that does nothing.
///
/// Stands in for the external tier when Redis is not configured or could not
/// be reached at startup. Every lookup is a miss.
pub struct NullCache;

impl NullCache {
    /// Creates a new NullCache instance.
    pub fn new() -> Self {
        debug!("Using NullCache (external caching disabled)");
        Self
    }
}

impl Default for NullCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheService for NullCache {
    async fn get(&self, _short_url: &str) -> Option<String> {
        None
    }

    async fn set(&self, _short_url: &str, _long_url: &str) {}

    fn name(&self) -> &'static str {
        "disabled"
    }
}
