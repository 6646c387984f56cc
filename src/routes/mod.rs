//! HTTP route handlers.
//!
//! Two endpoints: the liveness probe at `/healthz` and the diagnostic payload
//! at `/`. Both are marked `no-store` so no intermediary ever answers a probe
//! from cache. Unknown paths get a JSON 404.
//!
//! Request tracing is enabled via middleware that generates a unique request ID
//! for each incoming request, allowing correlation of all logs within a request.

pub mod diagnostic;
pub mod health;

use axum::{
    extract::Request,
    http::header::{HeaderValue, CACHE_CONTROL},
    middleware,
    routing::{any, get},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::CACHE_CONTROL_PROBE;
use crate::error::AppError;
use crate::middleware::request_id_layer;
use crate::state::AppState;

/// Fallback for paths outside the probe surface.
async fn not_found(request: Request) -> AppError {
    AppError::NotFound(request.uri().path().to_string())
}

/// Creates the Axum router with all routes and headers.
pub fn create_router(state: AppState) -> Router {
    let probe_routes = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/", any(diagnostic::root))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_PROBE),
        ));

    Router::new()
        .merge(probe_routes)
        .fallback(not_found)
        .with_state(state)
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}
