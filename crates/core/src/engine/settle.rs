//! Settle-all fan-out against the entity store.
//!
//! Every per-entity call runs to completion and is inspected on its own; one
//! failure never cancels its siblings.

use std::collections::HashMap;
use std::future::Future;

use futures::future::join_all;

use super::ChangeEngine;
use crate::error::EntityStoreError;
use crate::types::EntityId;
use crate::value::AttributeMap;

/// Per-entity write results of one fan-out.
#[derive(Debug, Default)]
pub(crate) struct WriteSummary {
    pub succeeded: usize,
    pub failed: Vec<(EntityId, EntityStoreError)>,
}

impl ChangeEngine {
    /// Bound a single entity-store call by the configured timeout.
    pub(crate) async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, EntityStoreError>>,
    ) -> Result<T, EntityStoreError> {
        match self.config.entity_call_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(EntityStoreError::Timeout(limit))),
            None => call.await,
        }
    }

    /// Read the current values each entity is about to change.
    ///
    /// Entities whose read fails or which do not exist are absent from the
    /// result; their old values are unknown.
    pub(crate) async fn read_current(
        &self,
        plan: &[(EntityId, AttributeMap)],
    ) -> HashMap<EntityId, AttributeMap> {
        let reads = plan.iter().map(|(entity_id, changes)| async move {
            let attributes: Vec<String> = changes.keys().cloned().collect();
            let result = self
                .bounded(self.entities.read(entity_id, &attributes))
                .await;
            (entity_id, result)
        });

        let mut current = HashMap::with_capacity(plan.len());
        for (entity_id, result) in join_all(reads).await {
            match result {
                Ok(Some(values)) => {
                    current.insert(entity_id.clone(), values);
                }
                Ok(None) => {
                    tracing::warn!(entity_id = %entity_id, "Entity not found while reading old values");
                }
                Err(e) => {
                    tracing::warn!(entity_id = %entity_id, error = %e, "Failed to read old values");
                }
            }
        }
        current
    }

    /// Issue one coalesced write per entity and collect every outcome.
    pub(crate) async fn write_all(&self, writes: &[(EntityId, AttributeMap)]) -> WriteSummary {
        let calls = writes.iter().map(|(entity_id, values)| async move {
            let result = self.bounded(self.entities.write(entity_id, values)).await;
            (entity_id, result)
        });

        let mut summary = WriteSummary::default();
        for (entity_id, result) in join_all(calls).await {
            match result {
                Ok(()) => summary.succeeded += 1,
                Err(e) => {
                    tracing::error!(entity_id = %entity_id, error = %e, "Entity write failed");
                    summary.failed.push((entity_id.clone(), e));
                }
            }
        }
        summary
    }
}
