//! Handler for short URL redirect.

use axum::{
    extract::{Path, State},
    http::HeaderValue,
    response::Redirect,
};
use serde_json::json;
use tokio::time::Instant;
use tracing::error;

use crate::error::AppError;
use crate::state::AppState;

/// Redirects a short code to its original URL.
///
/// # Endpoint
///
/// `GET /api/v1/url/{short_url}`
///
/// # Request Flow
///
/// 1. Admission gate (load-shedding middleware)
/// 2. Local cache, then external cache
/// 3. On a double miss, the store with retries, bounded by the request timeout
/// 4. Both cache tiers are populated from the store result
/// 5. A redirect event is queued for analytics
/// 6. Return 307 Temporary Redirect
///
/// # Errors
///
/// Returns 404 Not Found if the short code doesn't exist and 500 if the
/// store could not be reached in time.
pub async fn redirect_handler(
    Path(short_url): Path<String>,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let deadline = Instant::now() + state.request_timeout;

    let resolved = state
        .redirect_service
        .resolve(&short_url, &state.shutdown, deadline)
        .await?;

    // Rows written before normalization may not be valid header values.
    if HeaderValue::from_str(&resolved.long_url).is_err() {
        error!("Stored URL for {} is not a valid Location", short_url);
        return Err(AppError::internal(
            "Stored URL cannot be redirected to",
            json!({ "short_url": short_url }),
        ));
    }

    Ok(Redirect::temporary(&resolved.long_url))
}
