//! Redis-backed external cache.

use super::service::CacheService;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Shared cache tier backed by Redis.
///
/// Uses connection pooling via `ConnectionManager`. Every call is bounded by
/// `op_timeout`; errors and timeouts are logged and degrade to a miss or a
/// no-op, so the redirect path never waits on an unhealthy Redis.
pub struct RedisCache {
    client: ConnectionManager,
    ttl: Duration,
    op_timeout: Duration,
    key_prefix: String,
}

impl RedisCache {
    /// Connects to Redis and validates the connection with a PING.
    ///
    /// # Arguments
    ///
    /// - `redis_url` - Redis connection string (e.g., `"redis://localhost:6379"`)
    /// - `ttl` - expiry applied to every stored mapping
    /// - `op_timeout` - upper bound for each GET/SET round trip
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection cannot be
    /// established, or the PING health check fails or times out.
    pub async fn connect(redis_url: &str, ttl: Duration, op_timeout: Duration) -> Result<Self> {
        info!("Connecting to Redis at {}", redis_url);

        let client = Client::open(redis_url).context("Failed to create Redis client")?;

        let manager = timeout(op_timeout, ConnectionManager::new(client))
            .await
            .context("Timed out connecting to Redis")?
            .context("Failed to connect to Redis")?;

        let mut test_conn = manager.clone();
        timeout(op_timeout, test_conn.ping::<()>())
            .await
            .context("Redis PING timed out")?
            .context("Redis PING failed")?;

        info!("✓ Connected to Redis");

        Ok(Self {
            client: manager,
            ttl,
            op_timeout,
            key_prefix: "url:".to_string(),
        })
    }

    /// Constructs the full Redis key with namespace prefix.
    fn build_key(&self, short_url: &str) -> String {
        format!("{}{}", self.key_prefix, short_url)
    }
}

#[async_trait]
impl CacheService for RedisCache {
    async fn get(&self, short_url: &str) -> Option<String> {
        let key = self.build_key(short_url);
        let mut conn = self.client.clone();

        match timeout(self.op_timeout, conn.get::<_, Option<String>>(&key)).await {
            Ok(Ok(Some(url))) => {
                debug!("Redis HIT: {} -> {}", short_url, url);
                Some(url)
            }
            Ok(Ok(None)) => {
                debug!("Redis MISS: {}", short_url);
                None
            }
            Ok(Err(e)) => {
                error!("Redis GET error for {}: {}", short_url, e);
                None
            }
            Err(_) => {
                warn!(
                    "Redis GET for {} timed out after {:?}",
                    short_url, self.op_timeout
                );
                None
            }
        }
    }

    async fn set(&self, short_url: &str, long_url: &str) {
        let key = self.build_key(short_url);
        let mut conn = self.client.clone();
        let ttl_seconds = self.ttl.as_secs().max(1);

        match timeout(
            self.op_timeout,
            conn.set_ex::<_, _, ()>(&key, long_url, ttl_seconds),
        )
        .await
        {
            Ok(Ok(())) => {
                debug!(
                    "Redis SET: {} -> {} (TTL: {}s)",
                    short_url, long_url, ttl_seconds
                );
            }
            Ok(Err(e)) => {
                warn!("Redis SET error for {}: {}", short_url, e);
            }
            Err(_) => {
                warn!(
                    "Redis SET for {} timed out after {:?}",
                    short_url, self.op_timeout
                );
            }
        }
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        matches!(
            timeout(self.op_timeout, conn.ping::<()>()).await,
            Ok(Ok(()))
        )
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
