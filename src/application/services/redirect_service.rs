//! Read-through resolution of short URLs.

use async_trait::async_trait;
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::domain::events::{AnalyticsEvent, EventPublisher};
use crate::domain::repositories::{StoreError, UrlStore};
use crate::error::AppError;
use crate::infrastructure::cache::{CacheService, LocalCache};
use crate::resilience::{Attempt, AttemptOutcome, RetryEngine, RetryError};

/// Where a short URL was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Local,
    External,
    Store,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Local => "local",
            Tier::External => "external",
            Tier::Store => "store",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub long_url: String,
    pub tier: Tier,
}

/// Resolves short URLs through the local cache, the external cache and
/// finally the store.
///
/// A store hit populates the external tier, then the local tier. Store
/// lookups run through the [`RetryEngine`] bounded by the request deadline.
/// Every resolution, successful or not, queues a redirect event.
pub struct RedirectService {
    local: Arc<LocalCache>,
    external: Arc<dyn CacheService>,
    store: Arc<dyn UrlStore>,
    engine: RetryEngine,
    events: EventPublisher,
}

impl RedirectService {
    pub fn new(
        local: Arc<LocalCache>,
        external: Arc<dyn CacheService>,
        store: Arc<dyn UrlStore>,
        engine: RetryEngine,
        events: EventPublisher,
    ) -> Self {
        Self {
            local,
            external,
            store,
            engine,
            events,
        }
    }

    /// Resolves `short_url` to its long URL.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the store has no mapping and
    /// [`AppError::Internal`] when the lookup is exhausted, times out or is
    /// cancelled by `cancel` or `deadline`.
    pub async fn resolve(
        &self,
        short_url: &str,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Result<Resolved, AppError> {
        let result = self.lookup(short_url, cancel, deadline).await;

        let long_url = result.as_ref().ok().map(|r| r.long_url.as_str());
        self.events.publish(AnalyticsEvent::url_redirected(
            short_url,
            long_url,
            result.is_ok(),
        ));

        result
    }

    async fn lookup(
        &self,
        short_url: &str,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Result<Resolved, AppError> {
        if let Some(long_url) = self.local.get_entry(short_url) {
            return Ok(hit(long_url, Tier::Local));
        }
        metrics::counter!("cache_misses_total", "tier" => "local").increment(1);

        if let Some(long_url) = self.external.get(short_url).await {
            self.local.set_entry(short_url, &long_url);
            return Ok(hit(long_url, Tier::External));
        }
        metrics::counter!("cache_misses_total", "tier" => self.external.name()).increment(1);

        let mut op = Lookup {
            store: self.store.as_ref(),
            short_url,
        };

        let long_url = self
            .engine
            .retry_until(&mut op, cancel, deadline)
            .await
            .map_err(|e| lookup_failure(short_url, e))?;

        self.external.set(short_url, &long_url).await;
        self.local.set_entry(short_url, &long_url);

        Ok(hit(long_url, Tier::Store))
    }
}

/// Store read for one short URL.
struct Lookup<'a> {
    store: &'a dyn UrlStore,
    short_url: &'a str,
}

#[async_trait]
impl Attempt for Lookup<'_> {
    type Output = String;
    type Error = StoreError;

    async fn attempt(&mut self) -> AttemptOutcome<String, StoreError> {
        self.store.find_long_url(self.short_url).await.into()
    }
}

fn hit(long_url: String, tier: Tier) -> Resolved {
    debug!("Resolved from {}: {}", tier, long_url);
    metrics::counter!("redirect_resolved_total", "tier" => tier.as_str()).increment(1);
    Resolved { long_url, tier }
}

fn lookup_failure(short_url: &str, e: RetryError<StoreError>) -> AppError {
    if let RetryError::Permanent(StoreError::NotFound) = e {
        return AppError::not_found("Short URL not found", json!({ "short_url": short_url }));
    }

    error!("Failed to resolve {}: {}", short_url, e);
    AppError::internal(
        "Failed to resolve short URL",
        json!({ "short_url": short_url, "reason": e.kind() }),
    )
}
