//! Sink used when analytics delivery is disabled.

use async_trait::async_trait;
use tracing::trace;

use crate::domain::events::AnalyticsEvent;
use crate::domain::repositories::{AnalyticsSink, SinkError};

/// Accepts and discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl AnalyticsSink for NullSink {
    async fn send(&self, event: &AnalyticsEvent) -> Result<(), SinkError> {
        trace!("Discarding {} event", event.kind());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}
