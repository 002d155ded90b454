pub mod attributes;
pub mod batches;
pub mod health;
pub mod logs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /batches                      submit (POST), list (GET ?status, view, limit, offset)
/// /batches/{id}                 get
/// /batches/{id}/logs            change logs with attribute labels
/// /batches/{id}/cancel          cancel a scheduled batch (POST)
/// /batches/{id}/revert          revert the whole batch (POST)
///
/// /logs/{id}                    get
/// /logs/{id}/revert             revert a single change (POST)
///
/// /attributes                   attribute dictionary
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/batches", batches::router())
        .nest("/logs", logs::router())
        .nest("/attributes", attributes::router())
}
