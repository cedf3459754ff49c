//! Analytics events emitted by the serving path.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// API version stamped on every event.
pub const API_VERSION: u32 = 1;

/// Outcome of a shorten request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlCreationEvent {
    pub service_name: String,
    pub url: String,
    pub api_version: u32,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a redirect request. `long_url` is empty when resolution failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlRedirectEvent {
    pub service_name: String,
    pub short_url: String,
    pub long_url: String,
    pub api_version: u32,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Event handed from request handlers to the background event worker.
///
/// Handlers never wait on delivery: events are queued with
/// [`EventPublisher::publish`] and sent by
/// [`crate::domain::event_worker::run_event_worker`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    UrlCreation(UrlCreationEvent),
    UrlRedirect(UrlRedirectEvent),
}

impl AnalyticsEvent {
    pub fn url_created(url: &str, success: bool) -> Self {
        Self::UrlCreation(UrlCreationEvent {
            service_name: "shortener".to_string(),
            url: url.to_string(),
            api_version: API_VERSION,
            success,
            timestamp: Utc::now(),
        })
    }

    pub fn url_redirected(short_url: &str, long_url: Option<&str>, success: bool) -> Self {
        Self::UrlRedirect(UrlRedirectEvent {
            service_name: "redirector".to_string(),
            short_url: short_url.to_string(),
            long_url: long_url.unwrap_or_default().to_string(),
            api_version: API_VERSION,
            success,
            timestamp: Utc::now(),
        })
    }

    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UrlCreation(_) => "url_creation",
            Self::UrlRedirect(_) => "url_redirect",
        }
    }
}

/// Non-blocking handle for queueing analytics events.
///
/// A full or closed queue drops the event; analytics never slow down a
/// request.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: mpsc::Sender<AnalyticsEvent>,
}

impl EventPublisher {
    pub fn new(tx: mpsc::Sender<AnalyticsEvent>) -> Self {
        Self { tx }
    }

    /// Creates a publisher and the receiving end for the worker.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AnalyticsEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Queues `event`, returning `false` if it had to be dropped.
    pub fn publish(&self, event: AnalyticsEvent) -> bool {
        let kind = event.kind();
        match self.tx.try_send(event) {
            Ok(()) => {
                debug!("Queued {} event", kind);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event queue full, dropping {} event", kind);
                metrics::counter!("analytics_events_dropped_total", "reason" => "full")
                    .increment(1);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Event queue closed, dropping {} event", kind);
                metrics::counter!("analytics_events_dropped_total", "reason" => "closed")
                    .increment(1);
                false
            }
        }
    }

    /// Number of free slots left in the queue.
    pub fn remaining_capacity(&self) -> usize {
        self.tx.capacity()
    }

    pub fn max_capacity(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Returns `true` once the worker has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
