//! HTTP analytics sink.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::events::AnalyticsEvent;
use crate::domain::repositories::{AnalyticsSink, SinkError};

/// Posts each event as a JSON document to a collector endpoint.
///
/// Connection failures, timeouts, `408`, `429` and `5xx` responses are
/// reported as [`SinkError::Unavailable`] and retried by the event worker.
/// Any other non-success status is a [`SinkError::Rejected`].
pub struct HttpAnalyticsSink {
    client: Client,
    endpoint: String,
}

impl HttpAnalyticsSink {
    /// Builds a sink posting to `endpoint`, bounding each request by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if `endpoint` is not a valid URL or the HTTP client
    /// cannot be constructed.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let url = reqwest::Url::parse(endpoint)
            .with_context(|| format!("Invalid analytics endpoint: {}", endpoint))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build analytics HTTP client")?;

        info!("Analytics events will be posted to {}", url);

        Ok(Self {
            client,
            endpoint: url.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Maps a collector response status onto the sink's retry classification.
fn classify_status(status: StatusCode) -> Result<(), SinkError> {
    if status.is_success() {
        return Ok(());
    }

    let reason = status.to_string();
    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        Err(SinkError::Unavailable(reason))
    } else {
        Err(SinkError::Rejected(reason))
    }
}

#[async_trait]
impl AnalyticsSink for HttpAnalyticsSink {
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    SinkError::Rejected(e.to_string())
                } else {
                    SinkError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status();
        debug!("Analytics collector answered {} for {} event", status, event.kind());
        classify_status(status)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
