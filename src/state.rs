//! Shared application state injected into every handler.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::application::services::{RedirectService, ShortenService};
use crate::domain::events::EventPublisher;
use crate::domain::repositories::UrlStore;
use crate::infrastructure::cache::{CacheService, LocalCache};
use crate::resilience::AdmissionController;

/// Cheap-to-clone handle on everything a request needs.
#[derive(Clone)]
pub struct AppState {
    pub redirect_service: Arc<RedirectService>,
    pub shorten_service: Arc<ShortenService>,
    pub store: Arc<dyn UrlStore>,
    pub local_cache: Arc<LocalCache>,
    pub external_cache: Arc<dyn CacheService>,
    pub admission: Arc<AdmissionController>,
    pub events: EventPublisher,
    /// Prefix for short URLs returned by the shorten endpoint.
    pub base_url: String,
    /// Deadline applied to every shorten and redirect request.
    pub request_timeout: Duration,
    /// Cancelled when the process begins shutting down.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Public URL of a short code.
    pub fn short_url_for(&self, short_id: &str) -> String {
        format!(
            "{}/api/v1/url/{}",
            self.base_url.trim_end_matches('/'),
            short_id
        )
    }
}
