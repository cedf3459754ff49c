//! Background delivery of analytics events.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::events::AnalyticsEvent;
use crate::domain::repositories::{AnalyticsSink, SinkError};
use crate::resilience::{Attempt, AttemptOutcome, RetryEngine};

/// Tuning for [`run_event_worker`].
#[derive(Debug, Clone, Copy)]
pub struct EventWorkerConfig {
    pub engine: RetryEngine,
    /// Upper bound on the time spent delivering a single event, retries included.
    pub send_timeout: Duration,
    /// Maximum number of events delivered at the same time.
    pub concurrency: usize,
}

struct Delivery<'a> {
    sink: &'a dyn AnalyticsSink,
    event: &'a AnalyticsEvent,
}

#[async_trait]
impl Attempt for Delivery<'_> {
    type Output = ();
    type Error = SinkError;

    async fn attempt(&mut self) -> AttemptOutcome<(), SinkError> {
        self.sink.send(self.event).await.into()
    }
}

/// Drains `rx`, delivering each event to `sink` through the retry engine.
///
/// Runs until every sender is dropped, then waits for in-flight deliveries.
/// Cancelling `abort` closes the queue and interrupts pending retries;
/// events still queued at that point are dropped.
pub async fn run_event_worker(
    mut rx: mpsc::Receiver<AnalyticsEvent>,
    sink: Arc<dyn AnalyticsSink>,
    config: EventWorkerConfig,
    abort: CancellationToken,
) {
    let concurrency = config.concurrency.max(1);
    let permits = Arc::new(Semaphore::new(concurrency));

    info!(
        "Event worker started (sink: {}, concurrency: {}, send timeout: {:?})",
        sink.name(),
        concurrency,
        config.send_timeout
    );

    loop {
        let event = tokio::select! {
            biased;
            _ = abort.cancelled() => {
                rx.close();
                break;
            }
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
            break;
        };
        let sink = Arc::clone(&sink);
        let abort = abort.clone();
        let deadline = Instant::now() + config.send_timeout;

        tokio::spawn(async move {
            let _permit = permit;
            deliver(&config.engine, sink.as_ref(), &event, &abort, deadline).await;
        });
    }

    let dropped = rx.len();
    if dropped > 0 {
        warn!("Event worker aborted with {} queued events", dropped);
        metrics::counter!("analytics_events_dropped_total", "reason" => "shutdown")
            .increment(dropped as u64);
    }

    let _ = permits.acquire_many(concurrency as u32).await;
    info!("Event worker stopped");
}

async fn deliver(
    engine: &RetryEngine,
    sink: &dyn AnalyticsSink,
    event: &AnalyticsEvent,
    abort: &CancellationToken,
    deadline: Instant,
) {
    let mut delivery = Delivery { sink, event };

    match engine.retry_until(&mut delivery, abort, deadline).await {
        Ok(()) => {
            debug!("Delivered {} event to {}", event.kind(), sink.name());
            metrics::counter!("analytics_events_sent_total").increment(1);
        }
        Err(e) => {
            warn!("Dropping {} event: {}", event.kind(), e);
            metrics::counter!("analytics_events_failed_total", "outcome" => e.kind())
                .increment(1);
        }
    }
}
