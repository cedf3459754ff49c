//! Two-tier caching for fast redirect lookups.
//!
//! Provides a [`CacheService`] trait with three implementations:
//! - [`LocalCache`] - In-process LRU + TTL tier consulted first
//! - [`RedisCache`] - Shared Redis tier with a longer TTL
//! - [`NullCache`] - No-op stand-in when Redis is disabled

mod local_cache;
mod null_cache;
mod recency;
mod redis_cache;
mod service;

pub use local_cache::LocalCache;
pub use null_cache::NullCache;
pub use recency::RecencyList;
pub use redis_cache::RedisCache;
pub use service::CacheService;
