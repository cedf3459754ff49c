//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse, ResourceUsage};
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health`
///
/// Not subject to load shedding, so it keeps answering while the admission
/// gate is closed.
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "database": { "status": "ok", "message": "Connected" },
///     "cache": { "status": "ok", "message": "redis reachable, local: 42/10000" },
///     "event_queue": { "status": "ok", "message": "Free slots: 9998/10000" }
///   },
///   "resources": { "cpu": 0.12, "memory": 0.43, "admitting": true }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let database = check_database(&state).await;
    let cache = check_cache(&state).await;
    let event_queue = check_event_queue(&state);

    let all_healthy = database.is_ok() && cache.is_ok() && event_queue.is_ok();

    let sample = state.admission.latest();
    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database,
            cache,
            event_queue,
        },
        resources: ResourceUsage {
            cpu: sample.cpu,
            memory: sample.mem,
            admitting: state.admission.gate().is_allowed(),
            sampled_at: sample.sampled_at.map(|t| t.to_rfc3339()),
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn check_database(state: &AppState) -> CheckStatus {
    if state.store.ping().await {
        CheckStatus::ok("Connected")
    } else {
        CheckStatus::error("Database unreachable")
    }
}

async fn check_cache(state: &AppState) -> CheckStatus {
    let local = format!(
        "local: {}/{}",
        state.local_cache.len(),
        state.local_cache.max_entries()
    );

    if state.external_cache.health_check().await {
        CheckStatus::ok(format!("{} reachable, {}", state.external_cache.name(), local))
    } else {
        CheckStatus::error(format!(
            "{} unreachable, {}",
            state.external_cache.name(),
            local
        ))
    }
}

fn check_event_queue(state: &AppState) -> CheckStatus {
    let free = state.events.remaining_capacity();
    let max = state.events.max_capacity();

    if state.events.is_closed() {
        CheckStatus::error("Event queue is closed")
    } else {
        CheckStatus::ok(format!("Free slots: {}/{}", free, max))
    }
}
