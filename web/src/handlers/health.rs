//! Health check endpoint.

use axum::http::StatusCode;

/// Liveness probe.
///
/// Returns 200 OK while the process is serving. Does not touch the
/// database.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
