//! Load-shedding middleware backed by the admission controller.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use serde_json::json;
use tracing::debug;

use crate::{error::AppError, resilience::Admission, state::AppState};

/// Rejects requests with `503 Service Unavailable` while the host is above
/// its CPU or memory threshold.
///
/// The decision reads the latest sample published by the background
/// sampler and never blocks. Until the first sample arrives every request is
/// admitted.
///
/// # Example
///
/// ```rust,ignore
/// let shed = Router::new()
///     .route("/api/v1/url/{short_url}", get(redirect_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), load_shed::layer));
/// ```
pub async fn layer(
    State(st): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Admission::Reject(reason) = st.admission.gate() {
        debug!("Shedding {} {}: {}", req.method(), req.uri().path(), reason);
        metrics::counter!("admission_rejected_total", "resource" => reason.resource())
            .increment(1);

        return Err(AppError::unavailable(
            "Service unavailable",
            json!({ "reason": reason.to_string() }),
        ));
    }

    Ok(next.run(req).await)
}
