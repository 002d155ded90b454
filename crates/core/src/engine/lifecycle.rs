//! Batch status transitions. The only code that mutates a batch after creation.

use chrono::Utc;

use super::ChangeEngine;
use crate::batch::{self, BatchStatus, REVERTABLE_STATUSES};
use crate::error::CoreError;
use crate::model::{ChangeBatch, ChangeLog, NewChangeLog};
use crate::types::DbId;

impl ChangeEngine {
    /// Cancel a batch that is still `Scheduled`.
    pub async fn cancel(&self, batch_id: DbId) -> Result<ChangeBatch, CoreError> {
        let batch = self.get_batch(batch_id).await?;
        if !batch::can_cancel(batch.status) {
            return Err(CoreError::InvalidState(format!(
                "Batch {batch_id} cannot be cancelled (must be Scheduled, status is {})",
                batch.status
            )));
        }

        let cancelled = self
            .batches
            .transition_status(
                batch_id,
                &[BatchStatus::Scheduled],
                BatchStatus::Cancelled,
                Some(Utc::now()),
            )
            .await?
            .ok_or_else(|| {
                CoreError::InvalidState(format!(
                    "Batch {batch_id} left Scheduled status before it could be cancelled"
                ))
            })?;

        tracing::info!(batch_id, "Scheduled batch cancelled");
        Ok(cancelled)
    }

    /// Record the final outcome of a batch and stamp `completed_at`.
    pub(crate) async fn finalize(
        &self,
        batch_id: DbId,
        status: BatchStatus,
    ) -> Result<ChangeBatch, CoreError> {
        self.batches
            .update_status(batch_id, status, Some(Utc::now()))
            .await?
            .ok_or(CoreError::NotFound {
                entity: "ChangeBatch",
                id: batch_id,
            })
    }

    /// Like [`Self::finalize`], but a batch whose final status cannot be
    /// recorded is forced to `Failed` before the error is returned.
    pub(crate) async fn finalize_or_fail(
        &self,
        batch_id: DbId,
        status: BatchStatus,
    ) -> Result<ChangeBatch, CoreError> {
        match self.finalize(batch_id, status).await {
            Ok(batch) => Ok(batch),
            Err(e) => {
                tracing::error!(
                    batch_id,
                    status = %status,
                    error = %e,
                    "Failed to record final batch status"
                );
                self.mark_failed(batch_id).await;
                Err(e)
            }
        }
    }

    /// Best-effort: force a batch to `Failed`.
    ///
    /// A failure here is logged and dropped so the caller can surface the
    /// error that caused it.
    pub(crate) async fn mark_failed(&self, batch_id: DbId) {
        match self
            .batches
            .update_status(batch_id, BatchStatus::Failed, Some(Utc::now()))
            .await
        {
            Ok(_) => tracing::warn!(batch_id, "Batch marked as Failed"),
            Err(e) => tracing::error!(
                batch_id,
                error = %e,
                "Could not mark batch as Failed; status may be misleading"
            ),
        }
    }

    /// Annotate an original batch as reverted by `revert_id`. One-way.
    ///
    /// When the annotation cannot be stored the revert is forced to `Failed`,
    /// so the original is `Reverted` only if its revert did not fail.
    pub(crate) async fn mark_reverted(
        &self,
        batch_id: DbId,
        revert_id: DbId,
    ) -> Result<(), CoreError> {
        match self
            .batches
            .transition_status(batch_id, REVERTABLE_STATUSES, BatchStatus::Reverted, None)
            .await
        {
            Ok(Some(_)) => Ok(()),
            Ok(None) => {
                tracing::warn!(
                    batch_id,
                    "Original batch was no longer revertable when marking it Reverted"
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    batch_id,
                    revert_batch_id = revert_id,
                    error = %e,
                    "Failed to mark original batch Reverted"
                );
                self.mark_failed(revert_id).await;
                Err(e.into())
            }
        }
    }

    /// Persist logs for a batch; on failure force the batch to `Failed`.
    ///
    /// Entity writes that already happened are not rolled back.
    pub(crate) async fn append_logs_or_fail(
        &self,
        batch: &ChangeBatch,
        entries: &[NewChangeLog],
    ) -> Result<Vec<ChangeLog>, CoreError> {
        match self.logs.append_many(batch.id, entries).await {
            Ok(logs) => {
                tracing::debug!(batch_id = batch.id, count = logs.len(), "Change logs appended");
                Ok(logs)
            }
            Err(e) => {
                tracing::error!(
                    batch_id = batch.id,
                    error = %e,
                    "Failed to append change logs after batch creation"
                );
                self.mark_failed(batch.id).await;
                Err(e.into())
            }
        }
    }
}
