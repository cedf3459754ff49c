//! Handler for the shorten endpoint.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde_json::json;
use tokio::time::Instant;
use tracing::debug;
use validator::Validate;

use crate::api::dto::shorten::{ShortenRequest, ShortenResponse};
use crate::domain::events::AnalyticsEvent;
use crate::error::AppError;
use crate::state::AppState;

/// Creates a short URL for a long URL.
///
/// # Endpoint
///
/// `POST /api/v1/url/shorten`
///
/// # Request Body
///
/// ```json
/// { "url": "https://example.com/some/long/path" }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "url": "http://localhost:3001/api/v1/url/aB3dE_9z",
///   "short_id": "aB3dE_9z"
/// }
/// ```
///
/// # Errors
///
/// - 400 Bad Request if the body is not a JSON object with a `url` string, or
///   the URL is malformed, not http(s) or too long
/// - 409 Conflict if the URL is already shortened
/// - 500 Internal Server Error if the store write fails
///
/// Every rejection is reported in the JSON error envelope and counted as a
/// failed creation event.
pub async fn shorten_handler(
    State(state): State<AppState>,
    payload: Result<Json<ShortenRequest>, JsonRejection>,
) -> Result<Json<ShortenResponse>, AppError> {
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            debug!("Rejected shorten payload: {}", rejection.body_text());
            state.events.publish(AnalyticsEvent::url_created("", false));
            return Err(AppError::bad_request(
                "Invalid request payload",
                json!({ "reason": rejection.body_text() }),
            ));
        }
    };

    if let Err(e) = payload.validate() {
        state
            .events
            .publish(AnalyticsEvent::url_created(&payload.url, false));
        return Err(e.into());
    }

    let deadline = Instant::now() + state.request_timeout;
    let mapping = state
        .shorten_service
        .shorten(&payload.url, &state.shutdown, deadline)
        .await?;

    Ok(Json(ShortenResponse {
        url: state.short_url_for(&mapping.short_url),
        short_id: mapping.short_url,
    }))
}
