//! Submitter identity extractor for Axum handlers.

use amend_core::types::DbId;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;

/// Header carrying the id of the user submitting a change.
pub const SUBMITTER_HEADER: &str = "x-user-id";

/// Optional submitter taken from the `x-user-id` header.
///
/// Absent header yields `Submitter(None)`; a present but non-numeric header
/// is rejected with 400.
#[derive(Debug, Clone, Copy, Default)]
pub struct Submitter(pub Option<DbId>);

impl<S> FromRequestParts<S> for Submitter
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Some(raw) = parts.headers.get(SUBMITTER_HEADER) else {
            return Ok(Submitter(None));
        };

        raw.to_str()
            .ok()
            .and_then(|v| v.trim().parse::<DbId>().ok())
            .map(|id| Submitter(Some(id)))
            .ok_or_else(|| {
                AppError::BadRequest(format!("{SUBMITTER_HEADER} must be a numeric user id"))
            })
    }
}
