//! Short URL creation.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::domain::entities::UrlMapping;
use crate::domain::events::{AnalyticsEvent, EventPublisher};
use crate::domain::repositories::{StoreError, UrlStore};
use crate::error::AppError;
use crate::resilience::{Attempt, AttemptOutcome, RetryEngine, RetryError};
use crate::utils::code_generator::short_code;
use crate::utils::http_url::validate_http_url;

/// Store write for one mapping. Each attempt sends its own copy.
struct Insert<'a> {
    store: &'a dyn UrlStore,
    mapping: &'a UrlMapping,
}

#[async_trait]
impl Attempt for Insert<'_> {
    type Output = ();
    type Error = StoreError;

    async fn attempt(&mut self) -> AttemptOutcome<(), StoreError> {
        self.store.create(self.mapping.clone()).await.into()
    }
}

/// Validates long URLs, derives their short code and persists the mapping.
pub struct ShortenService {
    store: Arc<dyn UrlStore>,
    engine: RetryEngine,
    events: EventPublisher,
}

impl ShortenService {
    pub fn new(store: Arc<dyn UrlStore>, engine: RetryEngine, events: EventPublisher) -> Self {
        Self {
            store,
            engine,
            events,
        }
    }

    /// Shortens `long_url`.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] if the URL is not an http(s) URL of at most 1024 characters
    /// - [`AppError::Conflict`] if the URL, or another URL with the same code, is already stored
    /// - [`AppError::Internal`] if the store write is exhausted, times out or is cancelled
    pub async fn shorten(
        &self,
        long_url: &str,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Result<UrlMapping, AppError> {
        let result = self.create(long_url, cancel, deadline).await;
        self.events
            .publish(AnalyticsEvent::url_created(long_url, result.is_ok()));
        result
    }

    async fn create(
        &self,
        long_url: &str,
        cancel: &CancellationToken,
        deadline: Instant,
    ) -> Result<UrlMapping, AppError> {
        let long_url = validate_http_url(long_url).map_err(|e| {
            AppError::bad_request("Invalid URL", json!({ "reason": e.to_string() }))
        })?;

        let mapping = UrlMapping::new(short_code(&long_url), long_url);

        let mut op = Insert {
            store: self.store.as_ref(),
            mapping: &mapping,
        };

        match self.engine.retry_until(&mut op, cancel, deadline).await {
            Ok(()) => {
                info!("Shortened {} -> {}", mapping.long_url, mapping.short_url);
                Ok(mapping)
            }
            Err(RetryError::Permanent(StoreError::Conflict(constraint))) => Err(AppError::conflict(
                "URL already shortened",
                json!({ "short_id": mapping.short_url, "constraint": constraint }),
            )),
            Err(e) => {
                error!("Failed to store short URL for {}: {}", mapping.long_url, e);
                Err(AppError::internal(
                    "Failed to shorten URL",
                    json!({ "reason": e.kind() }),
                ))
            }
        }
    }
}
