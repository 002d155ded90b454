//! Route definitions for change logs, mounted at `/logs`.
//!
//! ```text
//! GET    /{id}              -> get_log
//! POST   /{id}/revert       -> revert_log
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::logs;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(logs::get_log))
        .route("/{id}/revert", post(logs::revert_log))
}
