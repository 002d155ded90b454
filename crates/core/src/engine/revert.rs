//! Whole-batch and single-log reverts.
//!
//! A revert is itself a batch: it gets its own `PendingRevert` record, its own
//! settle-all writes, and one inverse log per reverted log. The inverse logs
//! are appended before the writes; the unique `reverted_log_id` makes that
//! append the point where concurrent reverts of the same log are decided.

use std::collections::HashMap;

use super::{BatchOutcome, ChangeEngine};
use crate::batch::{self, BatchStatus};
use crate::error::CoreError;
use crate::model::{ChangeBatch, ChangeLog, NewChangeBatch, NewChangeLog};
use crate::store::UQ_REVERTED_LOG;
use crate::types::{DbId, EntityId};
use crate::value::AttributeMap;

impl ChangeEngine {
    /// Restore every value a finished batch changed.
    ///
    /// Logs already reverted on their own are skipped. On any outcome other
    /// than `Failed` the original batch is marked `Reverted`.
    pub async fn revert_batch(&self, batch_id: DbId) -> Result<BatchOutcome, CoreError> {
        let original = self.get_batch(batch_id).await?;
        if !batch::can_revert(original.status) {
            return Err(CoreError::InvalidState(format!(
                "Batch {batch_id} cannot be reverted (status is {})",
                original.status
            )));
        }

        let logs = self.logs.list_by_batch(batch_id).await?;
        if logs.is_empty() {
            return Err(CoreError::NotFound {
                entity: "ChangeLog",
                id: batch_id,
            });
        }

        let log_ids: Vec<DbId> = logs.iter().map(|l| l.id).collect();
        let done = self.logs.already_reverted(&log_ids).await?;
        let pending: Vec<&ChangeLog> = logs.iter().filter(|l| !done.contains(&l.id)).collect();
        if pending.is_empty() {
            return Err(CoreError::InvalidState(format!(
                "Every change in batch {batch_id} has already been reverted"
            )));
        }
        if !done.is_empty() {
            tracing::info!(
                batch_id,
                skipped = done.len(),
                "Skipping changes already reverted individually"
            );
        }

        let writes = self.group_inverse_writes(&pending);
        let entries: Vec<NewChangeLog> = pending
            .iter()
            .map(|log| NewChangeLog::inverse_of(log))
            .collect();

        let revert = self
            .create_pending_revert(
                batch::describe_batch_revert(batch_id, &original.description),
                Some(batch_id),
            )
            .await?;

        // The inverse logs claim the originals before any entity is touched.
        let revert_logs = self
            .append_logs_or_fail(&revert, &entries)
            .await
            .map_err(|e| {
                lost_revert_race(e, || {
                    format!("Changes in batch {batch_id} were reverted by a concurrent request")
                })
            })?;

        let summary = self.write_all(&writes).await;
        let status = batch::aggregate_write_status(summary.succeeded, summary.failed.len());
        tracing::info!(
            batch_id,
            revert_batch_id = revert.id,
            entities = writes.len(),
            succeeded = summary.succeeded,
            failed = summary.failed.len(),
            "Revert writes settled"
        );

        let revert = self.finalize_or_fail(revert.id, status).await?;
        if revert.status != BatchStatus::Failed {
            self.mark_reverted(batch_id, revert.id).await?;
        }

        tracing::info!(
            batch_id,
            revert_batch_id = revert.id,
            status = %revert.status,
            "Batch reverted"
        );
        Ok(BatchOutcome {
            batch: revert,
            logs: revert_logs,
        })
    }

    /// Restore the single value one log changed. The original batch is untouched.
    pub async fn revert_log(&self, log_id: DbId) -> Result<BatchOutcome, CoreError> {
        let log = self.get_log(log_id).await?;
        if let Some(target) = log.reverted_log_id {
            return Err(CoreError::InvalidState(format!(
                "Log {log_id} is itself a revert of log {target} and cannot be reverted"
            )));
        }
        let owner = self.get_batch(log.batch_id).await?;
        if !batch::can_revert_log_of(owner.status) {
            return Err(CoreError::InvalidState(format!(
                "Log {log_id} cannot be reverted: batch {} never applied it (status is {})",
                owner.id, owner.status
            )));
        }
        if let Some(existing) = self.logs.find_reverting(log_id).await? {
            return Err(CoreError::InvalidState(format!(
                "Log {log_id} has already been reverted by log {}",
                existing.id
            )));
        }

        let revert = self
            .create_pending_revert(batch::describe_log_revert(log_id, log.batch_id), None)
            .await?;
        let revert_logs = self
            .append_logs_or_fail(&revert, &[NewChangeLog::inverse_of(&log)])
            .await
            .map_err(|e| {
                lost_revert_race(e, || {
                    format!("Log {log_id} was reverted by a concurrent request")
                })
            })?;

        let mut values = AttributeMap::new();
        values.insert(
            log.attribute_name.clone(),
            self.decode_for(&log.attribute_name, log.old_value.as_deref()),
        );
        let status = match self
            .bounded(self.entities.write(&log.entity_id, &values))
            .await
        {
            Ok(()) => BatchStatus::Completed,
            Err(e) => {
                tracing::error!(
                    log_id,
                    entity_id = %log.entity_id,
                    error = %e,
                    "Single-log revert write failed"
                );
                BatchStatus::Failed
            }
        };

        let revert = self.finalize_or_fail(revert.id, status).await?;

        tracing::info!(
            log_id,
            revert_batch_id = revert.id,
            status = %revert.status,
            "Log reverted"
        );
        Ok(BatchOutcome {
            batch: revert,
            logs: revert_logs,
        })
    }

    async fn create_pending_revert(
        &self,
        description: String,
        reverted_batch_id: Option<DbId>,
    ) -> Result<ChangeBatch, CoreError> {
        Ok(self
            .batches
            .create(&NewChangeBatch {
                status: BatchStatus::PendingRevert,
                scheduled_for: None,
                completed_at: None,
                description,
                reverted_batch_id,
                submitter_id: None,
            })
            .await?)
    }

    /// One write per entity restoring every logged old value, in first-seen order.
    fn group_inverse_writes(&self, logs: &[&ChangeLog]) -> Vec<(EntityId, AttributeMap)> {
        let mut writes: Vec<(EntityId, AttributeMap)> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for log in logs {
            let slot = *index.entry(log.entity_id.as_str()).or_insert_with(|| {
                writes.push((log.entity_id.clone(), AttributeMap::new()));
                writes.len() - 1
            });
            writes[slot].1.insert(
                log.attribute_name.clone(),
                self.decode_for(&log.attribute_name, log.old_value.as_deref()),
            );
        }
        writes
    }
}

/// Another revert got its inverse logs in first: report a conflict rather
/// than a storage fault. No entity was written by the losing request.
fn lost_revert_race(err: CoreError, message: impl FnOnce() -> String) -> CoreError {
    match err {
        CoreError::Storage(e) if e.is_unique_violation(UQ_REVERTED_LOG) => {
            tracing::warn!(error = %e, "Revert lost a race for its target logs");
            CoreError::Conflict(message())
        }
        other => other,
    }
}
