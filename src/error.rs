use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

/// Errors surfaced to HTTP clients.
///
/// The probe endpoints themselves never fail; this covers requests that miss
/// every route.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Path not found: {0}")]
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, path) = match &self {
            AppError::NotFound(path) => (StatusCode::NOT_FOUND, path.clone()),
        };

        tracing::debug!(status = status.as_u16(), %path, "Request rejected");

        let body = json!({
            "ok": false,
            "erro": self.to_string(),
            "path": path,
        });

        (status, Json(body)).into_response()
    }
}
