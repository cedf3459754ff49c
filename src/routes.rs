//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /health`                  - Health check: DB, cache, event queue, resources
//! - `POST /api/v1/url/shorten`      - Create a short URL
//! - `GET  /api/v1/url/{short_url}`  - Short URL redirect
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Load shedding** - 503 while CPU or memory is above threshold (API only)
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::health_handler;
use crate::api::middleware::{load_shed, tracing};
use crate::state::AppState;
use axum::routing::get;
use axum::{Router, middleware};
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the application router with all routes and middleware.
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    let url_router = api::routes::url_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        load_shed::layer,
    ));

    let router = Router::new()
        .route("/health", get(health_handler))
        .nest("/api/v1/url", url_router)
        .with_state(state)
        .layer(tracing::layer());

    NormalizePathLayer::trim_trailing_slash().layer(router)
}
