//! Route definitions for change batches.
//!
//! Mounted at `/batches` by `api_routes()`.
//!
//! ```text
//! GET    /                  -> list_batches (?status, view, limit, offset)
//! POST   /                  -> submit_batch
//! GET    /{id}              -> get_batch
//! GET    /{id}/logs         -> list_batch_logs
//! POST   /{id}/cancel       -> cancel_batch
//! POST   /{id}/revert       -> revert_batch
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::batches;
use crate::state::AppState;

/// Change batch routes -- mounted at `/batches`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(batches::list_batches).post(batches::submit_batch))
        .route("/{id}", get(batches::get_batch))
        .route("/{id}/logs", get(batches::list_batch_logs))
        .route("/{id}/cancel", post(batches::cancel_batch))
        .route("/{id}/revert", post(batches::revert_batch))
}
