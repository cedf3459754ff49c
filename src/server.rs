//! HTTP server initialization and runtime setup.
//!
//! Wires the store, both cache tiers, the admission controller and the
//! analytics pipeline together, then runs Axum until a shutdown signal.

use crate::application::services::{RedirectService, ShortenService};
use crate::config::Config;
use crate::domain::event_worker::{EventWorkerConfig, run_event_worker};
use crate::domain::events::EventPublisher;
use crate::domain::repositories::{AnalyticsSink, UrlStore};
use crate::infrastructure::analytics::{HttpAnalyticsSink, NullSink};
use crate::infrastructure::cache::{CacheService, LocalCache, NullCache, RedisCache};
use crate::infrastructure::persistence::PgUrlStore;
use crate::resilience::{AdmissionController, RetryEngine, SysinfoSampler};
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - PostgreSQL connection pool
/// - Local cache and its cleanup task
/// - Redis cache (or NullCache fallback)
/// - Resource sampler for load shedding
/// - Analytics event worker
/// - Axum HTTP server
///
/// On Ctrl-C or SIGTERM the server stops accepting requests and drains open
/// connections. The event worker then gets `SHUTDOWN_GRACE_SECS` to flush
/// queued events before pending deliveries are abandoned.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration cannot be turned into components
/// - Database connection fails
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_connect_timeout))
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    info!("Connected to database");

    let store: Arc<dyn UrlStore> = Arc::new(PgUrlStore::new(Arc::new(pool)));

    let local_cache = Arc::new(LocalCache::new(
        config.local_cache_max_entries,
        config.local_cache_ttl(),
    )?);

    let external_cache: Arc<dyn CacheService> = match &config.redis_url {
        Some(redis_url) => match RedisCache::connect(
            redis_url,
            config.external_cache_ttl(),
            config.external_cache_timeout(),
        )
        .await
        {
            Ok(redis) => {
                info!("External cache enabled (Redis)");
                Arc::new(redis)
            }
            Err(e) => {
                warn!("Failed to connect to Redis: {:#}. Using NullCache.", e);
                Arc::new(NullCache::new())
            }
        },
        None => {
            info!("External cache disabled (NullCache)");
            Arc::new(NullCache::new())
        }
    };

    let sink: Arc<dyn AnalyticsSink> = match &config.analytics_url {
        Some(url) => Arc::new(HttpAnalyticsSink::new(url, config.analytics_timeout())?),
        None => {
            info!("Analytics disabled, events will be discarded");
            Arc::new(NullSink)
        }
    };

    let engine = RetryEngine::new(config.retry_budget()?);
    let admission = Arc::new(AdmissionController::new(config.admission_config()?));

    let shutdown = CancellationToken::new();
    let worker_abort = CancellationToken::new();

    let cleanup_task =
        local_cache.spawn_cleanup(config.local_cache_cleanup_interval(), shutdown.child_token());
    let sampler_task = admission.spawn_sampler(SysinfoSampler::new(), shutdown.child_token());

    let (events, events_rx) = EventPublisher::channel(config.event_queue_capacity);
    let mut worker_task = tokio::spawn(run_event_worker(
        events_rx,
        sink,
        EventWorkerConfig {
            engine,
            send_timeout: config.event_delivery_timeout(),
            concurrency: config.event_worker_concurrency,
        },
        worker_abort.clone(),
    ));

    let state = AppState {
        redirect_service: Arc::new(RedirectService::new(
            Arc::clone(&local_cache),
            Arc::clone(&external_cache),
            Arc::clone(&store),
            engine,
            events.clone(),
        )),
        shorten_service: Arc::new(ShortenService::new(
            Arc::clone(&store),
            engine,
            events.clone(),
        )),
        store,
        local_cache,
        external_cache,
        admission,
        events,
        base_url: config.public_base_url.clone(),
        request_timeout: config.request_timeout(),
        shutdown: shutdown.clone(),
    };

    let app = app_router(state);

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{addr}");

    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let served = axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await;

    // The router, and with it every event sender, is gone once serve returns.
    shutdown.cancel();
    info!("HTTP server stopped, draining background tasks");

    match tokio::time::timeout(config.shutdown_grace(), &mut worker_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Event worker task failed: {}", e),
        Err(_) => {
            warn!(
                "Event worker did not drain within {:?}, abandoning queued events",
                config.shutdown_grace()
            );
            worker_abort.cancel();
            if let Err(e) = worker_task.await {
                error!("Event worker task failed: {}", e);
            }
        }
    }

    for (name, task) in [("cleanup", cleanup_task), ("sampler", sampler_task)] {
        if let Err(e) = task.await {
            error!("{} task failed: {}", name, e);
        }
    }

    info!("Shutdown complete");
    served.context("HTTP server error")
}

/// Cancels `shutdown` on Ctrl-C or SIGTERM.
async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
        _ = shutdown.cancelled() => return,
    }

    shutdown.cancel();
}
