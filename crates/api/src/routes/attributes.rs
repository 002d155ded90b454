use axum::routing::get;
use axum::Router;

use crate::handlers::attributes;
use crate::state::AppState;

/// Attribute dictionary routes -- mounted at `/attributes`.
pub fn router() -> Router<AppState> {
    Router::new().route("/", get(attributes::list_attributes))
}
