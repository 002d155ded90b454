//! Handlers for change batch endpoints.
//!
//! Submit, list, inspect, cancel, and revert batches of employee attribute
//! changes.

use std::collections::BTreeMap;

use amend_core::batch::{self, BatchView, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT};
use amend_core::engine::SubmitBatch;
use amend_core::model::{BatchFilter, BatchOrder};
use amend_core::types::{DbId, EntityId, Timestamp};
use amend_core::value::AttributeMap;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::handlers::logs::ChangeLogView;
use crate::middleware::submitter::Submitter;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request DTOs
// ---------------------------------------------------------------------------

/// Request body for submitting a batch.
///
/// `changes` maps each entity id to the attributes to set on it; `null`
/// clears an attribute.
#[derive(Debug, Deserialize)]
pub struct SubmitBatchRequest {
    #[serde(alias = "entityIds")]
    pub entity_ids: Vec<EntityId>,
    pub changes: BTreeMap<EntityId, AttributeMap>,
    /// When present the batch is recorded for later instead of applied now.
    #[serde(default, alias = "scheduledFor")]
    pub scheduled_for: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Query params
// ---------------------------------------------------------------------------

/// Query parameters for listing batches.
#[derive(Debug, Deserialize)]
pub struct ListBatchesParams {
    /// Comma-separated statuses, e.g. `Completed,Reverted`.
    pub status: Option<String>,
    pub view: Option<BatchView>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ListBatchesParams {
    fn into_filter(self) -> AppResult<BatchFilter> {
        let (statuses, order) = match (self.view, self.status.as_deref()) {
            (Some(_), Some(_)) => {
                return Err(AppError::BadRequest(
                    "Use either 'view' or 'status', not both".to_string(),
                ))
            }
            (Some(view), None) => (
                view.statuses().to_vec(),
                match view {
                    BatchView::Scheduled => BatchOrder::ScheduledSoonest,
                    BatchView::History => BatchOrder::NewestFirst,
                },
            ),
            (None, Some(raw)) => (batch::parse_status_list(raw)?, BatchOrder::NewestFirst),
            (None, None) => (Vec::new(), BatchOrder::NewestFirst),
        };

        Ok(BatchFilter {
            statuses,
            order,
            limit: batch::clamp_limit(self.limit, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT),
            offset: batch::clamp_offset(self.offset),
        })
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /
///
/// Apply a batch immediately, or record it for later when `scheduled_for`
/// is set. Partial write failures still return 201 with status
/// `CompletedWithErrors`.
pub async fn submit_batch(
    Submitter(submitter_id): Submitter,
    State(state): State<AppState>,
    Json(body): Json<SubmitBatchRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = state
        .engine
        .submit(SubmitBatch {
            entity_ids: body.entity_ids,
            changes: body.changes,
            scheduled_for: body.scheduled_for,
            submitter_id,
        })
        .await?;

    tracing::info!(
        submitter_id = ?submitter_id,
        batch_id = outcome.batch_id(),
        status = %outcome.status(),
        log_count = outcome.logs.len(),
        "Batch submitted"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: outcome })))
}

/// GET /
///
/// List batches, filtered by `status` or a predefined `view`.
pub async fn list_batches(
    State(state): State<AppState>,
    Query(params): Query<ListBatchesParams>,
) -> AppResult<impl IntoResponse> {
    let filter = params.into_filter()?;
    let batches = state.engine.list_batches(&filter).await?;
    Ok(Json(DataResponse { data: batches }))
}

/// GET /{id}
pub async fn get_batch(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let batch = state.engine.get_batch(id).await?;
    Ok(Json(DataResponse { data: batch }))
}

/// GET /{id}/logs
///
/// The batch's change logs in insertion order, with attribute labels.
pub async fn list_batch_logs(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let dictionary = state.engine.dictionary();
    let logs: Vec<ChangeLogView> = state
        .engine
        .list_logs(id)
        .await?
        .into_iter()
        .map(|log| ChangeLogView::new(log, dictionary))
        .collect();
    Ok(Json(DataResponse { data: logs }))
}

/// POST /{id}/cancel
///
/// Cancel a batch that is still scheduled.
pub async fn cancel_batch(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let batch = state.engine.cancel(id).await?;
    tracing::info!(batch_id = id, "Batch cancellation requested");
    Ok(Json(DataResponse { data: batch }))
}

/// POST /{id}/revert
///
/// Restore every value the batch changed, as a new batch.
pub async fn revert_batch(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let outcome = state.engine.revert_batch(id).await?;

    tracing::info!(
        batch_id = id,
        revert_batch_id = outcome.batch_id(),
        status = %outcome.status(),
        "Batch revert requested"
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: outcome })))
}
