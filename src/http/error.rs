//! Handler error type and its mapping to status codes.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::{persist::PersistError, runtime::handle::RuntimeError};

/// Error type for HTTP handlers.
///
/// Produces a `{ "error": ..., "code": ... }` JSON body.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A failure from the undo service.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    /// Malformed path or body.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing or invalid operator headers.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

/// Convenience alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Runtime(RuntimeError::Persist(err)) => classify_persist_error(err),
            AppError::Runtime(other) => {
                tracing::error!(error = %other, "Undo service error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

fn classify_persist_error(err: &PersistError) -> (StatusCode, &'static str, String) {
    match err {
        PersistError::EntryNotFound(_) | PersistError::UnknownEntity(_) => {
            (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
        }
        PersistError::AlreadyReverted(_) => {
            (StatusCode::CONFLICT, "ALREADY_REVERTED", err.to_string())
        }
        other => {
            tracing::error!(error = %other, "Persistence error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
