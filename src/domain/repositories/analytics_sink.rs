//! Destination for analytics events.

use crate::domain::events::AnalyticsEvent;
use crate::resilience::Classify;
use async_trait::async_trait;
use thiserror::Error;

/// Failures reported by an [`AnalyticsSink`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The endpoint could not be reached or asked the caller to back off.
    #[error("analytics endpoint unavailable: {0}")]
    Unavailable(String),

    /// The endpoint refused the event; resending it will not help.
    #[error("analytics endpoint rejected event: {0}")]
    Rejected(String),
}

impl Classify for SinkError {
    fn is_transient(&self) -> bool {
        matches!(self, SinkError::Unavailable(_))
    }
}

#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    /// Delivers one event.
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), SinkError>;

    fn name(&self) -> &'static str;
}
