use axum::{http::StatusCode, response::IntoResponse};

/// GET /health
pub async fn handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
