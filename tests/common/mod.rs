#![allow(dead_code)]

use async_trait::async_trait;
use axum::{Router, middleware, routing::get};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url_redirector::api::handlers::health_handler;
use url_redirector::api::middleware::load_shed;
use url_redirector::api::routes::url_routes;
use url_redirector::application::services::{RedirectService, ShortenService};
use url_redirector::domain::entities::UrlMapping;
use url_redirector::domain::events::{AnalyticsEvent, EventPublisher};
use url_redirector::domain::repositories::{StoreError, UrlStore};
use url_redirector::infrastructure::cache::LocalCache;
use url_redirector::resilience::{AdmissionConfig, AdmissionController, RetryBudget, RetryEngine};
use url_redirector::state::AppState;

/// In-memory [`UrlStore`] with injectable transient failures.
#[derive(Default)]
pub struct InMemoryStore {
    mappings: Mutex<HashMap<String, String>>,
    failures_left: AtomicU32,
    always_fail: AtomicBool,
    lookups: AtomicU32,
    writes: AtomicU32,
}

impl InMemoryStore {
    pub fn insert(&self, short_url: &str, long_url: &str) {
        self.mappings
            .lock()
            .insert(short_url.to_string(), long_url.to_string());
    }

    /// Fails the next `n` calls with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Fails every call with a transient error.
    pub fn go_down(&self) {
        self.always_fail.store(true, Ordering::SeqCst);
    }

    pub fn lookups(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn get(&self, short_url: &str) -> Option<String> {
        self.mappings.lock().get(short_url).cloned()
    }

    fn injected_failure(&self) -> Option<StoreError> {
        if self.always_fail.load(Ordering::SeqCst) {
            return Some(StoreError::Unavailable("connection refused".into()));
        }
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Some(StoreError::Unavailable("pool timed out".into()));
        }
        None
    }
}

#[async_trait]
impl UrlStore for InMemoryStore {
    async fn find_long_url(&self, short_url: &str) -> Result<String, StoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.injected_failure() {
            return Err(e);
        }
        self.get(short_url).ok_or(StoreError::NotFound)
    }

    async fn create(&self, mapping: UrlMapping) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = self.injected_failure() {
            return Err(e);
        }

        let mut mappings = self.mappings.lock();
        if mappings.contains_key(&mapping.short_url)
            || mappings.values().any(|v| *v == mapping.long_url)
        {
            return Err(StoreError::Conflict("urls_pkey".into()));
        }
        mappings.insert(mapping.short_url, mapping.long_url);
        Ok(())
    }

    async fn ping(&self) -> bool {
        !self.always_fail.load(Ordering::SeqCst)
    }
}

/// Everything a handler test needs to drive and inspect the service.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub local: Arc<LocalCache>,
    pub external: Arc<LocalCache>,
    pub admission: Arc<AdmissionController>,
    pub events: mpsc::Receiver<AnalyticsEvent>,
}

impl TestApp {
    /// Drains every event queued so far.
    pub fn drain_events(&mut self) -> Vec<AnalyticsEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub fn fast_engine() -> RetryEngine {
    RetryEngine::new(
        RetryBudget::new(
            Duration::from_millis(1),
            Duration::from_millis(5),
            Duration::from_secs(2),
            3,
        )
        .unwrap(),
    )
}

pub fn create_test_app() -> TestApp {
    let store = Arc::new(InMemoryStore::default());
    let local = Arc::new(LocalCache::new(100, Duration::from_secs(60)).unwrap());
    // A second LocalCache stands in for Redis as the external tier.
    let external = Arc::new(LocalCache::new(100, Duration::from_secs(60)).unwrap());
    let admission = Arc::new(AdmissionController::new(
        AdmissionConfig::new(0.9, 0.9, Duration::from_millis(500)).unwrap(),
    ));
    let (publisher, events) = EventPublisher::channel(100);
    let engine = fast_engine();

    let state = AppState {
        redirect_service: Arc::new(RedirectService::new(
            local.clone(),
            external.clone(),
            store.clone(),
            engine,
            publisher.clone(),
        )),
        shorten_service: Arc::new(ShortenService::new(
            store.clone(),
            engine,
            publisher.clone(),
        )),
        store: store.clone(),
        local_cache: local.clone(),
        external_cache: external.clone(),
        admission: admission.clone(),
        events: publisher,
        base_url: "http://short.test".to_string(),
        request_timeout: Duration::from_secs(2),
        shutdown: CancellationToken::new(),
    };

    TestApp {
        state,
        store,
        local,
        external,
        admission,
        events,
    }
}

/// Same layout as the production router, without path normalization.
pub fn test_router(state: AppState) -> Router {
    let url_router = url_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        load_shed::layer,
    ));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1/url", url_router)
        .with_state(state)
}
