//! Handlers for individual change logs.

use amend_core::attributes::AttributeDictionary;
use amend_core::model::ChangeLog;
use amend_core::types::DbId;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// A change log with the display label of its attribute.
#[derive(Debug, Serialize)]
pub struct ChangeLogView {
    #[serde(flatten)]
    pub log: ChangeLog,
    pub attribute_label: String,
}

impl ChangeLogView {
    pub fn new(log: ChangeLog, dictionary: &AttributeDictionary) -> Self {
        let attribute_label = dictionary.label(&log.attribute_name);
        Self {
            log,
            attribute_label,
        }
    }
}

/// GET /{id}
pub async fn get_log(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let log = state.engine.get_log(id).await?;
    Ok(Json(DataResponse {
        data: ChangeLogView::new(log, state.engine.dictionary()),
    }))
}

/// POST /{id}/revert
///
/// Restore the value a single log changed, as a new batch.
pub async fn revert_log(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.engine.revert_log(id).await?;

    tracing::info!(
        log_id = id,
        revert_batch_id = outcome.batch_id(),
        status = %outcome.status(),
        "Log revert requested"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: outcome })))
}
