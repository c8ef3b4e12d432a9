//! Health check endpoint.
//!
//! `GET /` returns 200 with an empty body. No authentication.

use axum::http::StatusCode;

pub async fn health_handler() -> StatusCode {
    StatusCode::OK
}
