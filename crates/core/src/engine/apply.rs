//! Submission: immediate apply and scheduled recording.

use std::collections::HashSet;

use chrono::Utc;

use super::{BatchOutcome, ChangeEngine, SubmitBatch};
use crate::batch::{self, BatchStatus};
use crate::error::CoreError;
use crate::model::{NewChangeBatch, NewChangeLog};
use crate::types::{DbId, EntityId, Timestamp};
use crate::value::{self, AttributeMap};

impl ChangeEngine {
    /// Submit a batch. Applies immediately unless `scheduled_for` is set.
    pub async fn submit(&self, request: SubmitBatch) -> Result<BatchOutcome, CoreError> {
        let targets = self.validate_submission(&request)?;
        match request.scheduled_for {
            Some(at) => self.schedule(targets, at, request.submitter_id).await,
            None => self.apply_now(targets, request.submitter_id).await,
        }
    }

    /// Check a submission before any side effect.
    ///
    /// Returns the per-entity changes in submission order, duplicates removed.
    fn validate_submission(
        &self,
        request: &SubmitBatch,
    ) -> Result<Vec<(EntityId, AttributeMap)>, CoreError> {
        let mut seen = HashSet::new();
        let entity_ids: Vec<&EntityId> = request
            .entity_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .collect();

        batch::validate_batch_size(entity_ids.len(), self.config.max_batch_size)?;

        let mut targets = Vec::with_capacity(entity_ids.len());
        for entity_id in entity_ids {
            if entity_id.trim().is_empty() {
                return Err(CoreError::Validation(
                    "Entity ids must not be empty".to_string(),
                ));
            }
            let changes = request
                .changes
                .get(entity_id)
                .filter(|changes| !changes.is_empty())
                .ok_or_else(|| {
                    CoreError::Validation(format!(
                        "Mismatch between entity ids and changes: no changes for '{entity_id}'"
                    ))
                })?;
            for attribute in changes.keys() {
                self.dictionary.ensure_known(attribute)?;
            }
            targets.push((entity_id.clone(), changes.clone()));
        }

        let ignored = request
            .changes
            .keys()
            .filter(|id| !seen.contains(id.as_str()))
            .count();
        if ignored > 0 {
            tracing::warn!(ignored, "Ignoring changes for entities not listed in entity_ids");
        }

        if let Some(at) = request.scheduled_for {
            if at <= Utc::now() {
                return Err(CoreError::Validation(
                    "Scheduled time must be in the future".to_string(),
                ));
            }
        }

        Ok(targets)
    }

    /// Read old values, write every entity, then record batch and logs.
    async fn apply_now(
        &self,
        targets: Vec<(EntityId, AttributeMap)>,
        submitter_id: Option<DbId>,
    ) -> Result<BatchOutcome, CoreError> {
        let current = self.read_current(&targets).await;

        let entries: Vec<NewChangeLog> = targets
            .iter()
            .flat_map(|(entity_id, changes)| {
                let old = current.get(entity_id);
                changes.iter().map(move |(attribute, new_value)| NewChangeLog {
                    entity_id: entity_id.clone(),
                    attribute_name: attribute.clone(),
                    old_value: value::encode(
                        old.and_then(|values| values.get(attribute))
                            .and_then(Option::as_ref),
                    ),
                    new_value: value::encode(new_value.as_ref()),
                    reverted_log_id: None,
                })
            })
            .collect();

        let summary = self.write_all(&targets).await;
        let status = batch::aggregate_write_status(summary.succeeded, summary.failed.len());
        tracing::info!(
            entities = targets.len(),
            succeeded = summary.succeeded,
            failed = summary.failed.len(),
            status = %status,
            "Immediate batch writes settled"
        );

        let batch = self
            .batches
            .create(&NewChangeBatch {
                status,
                scheduled_for: None,
                completed_at: Some(Utc::now()),
                description: batch::describe_immediate(targets.len()),
                reverted_batch_id: None,
                submitter_id,
            })
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    "Entity writes applied but the batch record could not be created"
                );
                e
            })?;

        let logs = self.append_logs_or_fail(&batch, &entries).await?;

        tracing::info!(batch_id = batch.id, status = %batch.status, logs = logs.len(), "Batch applied");
        Ok(BatchOutcome { batch, logs })
    }

    /// Record a batch for later execution. No entity is read or written.
    async fn schedule(
        &self,
        targets: Vec<(EntityId, AttributeMap)>,
        scheduled_for: Timestamp,
        submitter_id: Option<DbId>,
    ) -> Result<BatchOutcome, CoreError> {
        let batch = self
            .batches
            .create(&NewChangeBatch {
                status: BatchStatus::Scheduled,
                scheduled_for: Some(scheduled_for),
                completed_at: None,
                description: batch::describe_scheduled(targets.len()),
                reverted_batch_id: None,
                submitter_id,
            })
            .await?;

        let entries: Vec<NewChangeLog> = targets
            .iter()
            .flat_map(|(entity_id, changes)| {
                changes.iter().map(move |(attribute, new_value)| NewChangeLog {
                    entity_id: entity_id.clone(),
                    attribute_name: attribute.clone(),
                    old_value: None,
                    new_value: value::encode(new_value.as_ref()),
                    reverted_log_id: None,
                })
            })
            .collect();

        let logs = self.append_logs_or_fail(&batch, &entries).await?;

        tracing::info!(
            batch_id = batch.id,
            scheduled_for = %scheduled_for,
            logs = logs.len(),
            "Batch scheduled"
        );
        Ok(BatchOutcome { batch, logs })
    }
}
