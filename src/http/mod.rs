//! HTTP surface of the undo service.
//!
//! Thin axum handlers over [`UndoServiceHandle`]; every response body is
//! wrapped as `{ "data": ... }` and errors as `{ "error", "code" }`.

/// Error type and response mapping.
pub mod error;
/// Operator identity extractor.
pub mod extract;
/// Route handlers.
pub mod handlers;

use axum::Router;
use axum::routing::{get, post, put};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::runtime::handle::UndoServiceHandle;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Handle to the undo service task.
    pub undo: UndoServiceHandle,
}

impl AppState {
    /// Wraps a running service handle.
    pub fn new(undo: UndoServiceHandle) -> Self {
        Self { undo }
    }
}

/// Standard single-item response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    /// Payload.
    pub data: T,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/undo/{model_type}/{id}",
            get(handlers::undo_meta)
                .post(handlers::restore)
                .delete(handlers::dismiss),
        )
        .route("/entities/{model_type}/{id}", put(handlers::update_entity))
        .route("/change-log/{model_type}", get(handlers::list_change_log))
        .route(
            "/change-log/entries/{entry_id}/revert",
            post(handlers::revert_entry),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
