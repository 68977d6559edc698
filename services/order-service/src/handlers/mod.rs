//! HTTP and WebSocket handlers

pub mod book;
pub mod orders;
pub mod wallet;
pub mod ws;

use axum::http::StatusCode;
use axum::response::IntoResponse;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
