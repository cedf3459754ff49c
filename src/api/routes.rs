//! API route configuration.
//!
//! Every route here sits behind the load-shedding middleware
//! [`crate::api::middleware::load_shed`].

use crate::api::handlers::{redirect_handler, shorten_handler};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// URL routes, nested under `/api/v1/url`.
///
/// # Endpoints
///
/// - `POST /shorten`       - Create a short URL
/// - `GET  /{short_url}`   - Redirect to the long URL
///
/// The static `/shorten` segment takes precedence over the capture, so it
/// never resolves as a short code.
pub fn url_routes() -> Router<AppState> {
    Router::new()
        .route("/shorten", post(shorten_handler))
        .route("/{short_url}", get(redirect_handler))
}
