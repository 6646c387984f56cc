//! Liveness endpoint polled by the load balancer.
//!
//! Touches no state and makes no outbound calls, so it answers as long as the
//! process can serve HTTP at all.

use axum::http::{header::CONTENT_TYPE, StatusCode};
use axum::response::IntoResponse;

/// `GET /healthz`: 200 with a plain-text `ok`.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        "ok",
    )
}
