//! HTTP error mapping
//!
//! Translates the core error taxonomy to status codes. Responses carry only
//! a machine-readable `error` code and a `message`; invariant breaches and
//! transient failures never leak internals.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use types::CoreError;

/// Edge-level error for every handler.
#[derive(Debug)]
pub enum AppError {
    /// Missing or invalid credentials (401).
    Unauthenticated(String),
    /// Authenticated but not allowed (403).
    Forbidden(String),
    /// Anything the core reported.
    Core(CoreError),
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            // Core-level authorization failures are ownership checks on an
            // already-authenticated user.
            CoreError::Unauthorized(msg) => AppError::Forbidden(msg),
            other => AppError::Core(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Unauthenticated(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "UNAUTHORIZED", msg),
            AppError::Core(err) => {
                let status = match &err {
                    CoreError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                    CoreError::Unauthorized(_) => StatusCode::FORBIDDEN,
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
                    CoreError::TerminalState { .. } => StatusCode::CONFLICT,
                    CoreError::ContractClosed(_) => StatusCode::CONFLICT,
                    CoreError::Invariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    CoreError::TransientIo(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                let message = match &err {
                    CoreError::Invariant(detail) => {
                        tracing::error!(%detail, "invariant violation surfaced to edge");
                        "internal error".to_string()
                    }
                    CoreError::TransientIo(detail) => {
                        tracing::warn!(%detail, "transient failure surfaced to edge");
                        "temporarily unavailable, retry".to_string()
                    }
                    other => other.to_string(),
                };
                (status, err.code(), message)
            }
        };

        let body = Json(json!({
            "error": code,
            "message": message,
        }));
        (status, body).into_response()
    }
}
