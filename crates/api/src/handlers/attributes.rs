//! Handler for the attribute dictionary.

use amend_core::attributes::AttributeDef;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /
///
/// The attributes a batch may change, in display order.
pub async fn list_attributes(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let data: Vec<AttributeDef> = state.engine.dictionary().iter().cloned().collect();
    Ok(Json(DataResponse { data }))
}
