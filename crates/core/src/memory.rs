//! In-process store implementations.
//!
//! [`MemoryChangeStore`] mirrors the Postgres schema's constraints (batch
//! foreign key, unique `reverted_log_id`) and [`MemoryEntityStore`] stands in
//! for the employee table. Both support fault injection so partial-failure
//! paths can be exercised without a database.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::batch::BatchStatus;
use crate::error::{EntityStoreError, StorageError};
use crate::model::{BatchFilter, BatchOrder, ChangeBatch, ChangeLog, NewChangeBatch, NewChangeLog};
use crate::store::{BatchStore, EntityStore, LogStore, StoreResult, UQ_REVERTED_LOG};
use crate::types::{DbId, EntityId, Timestamp};
use crate::value::AttributeMap;

// ---------------------------------------------------------------------------
// MemoryChangeStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ChangeState {
    batches: Vec<ChangeBatch>,
    logs: Vec<ChangeLog>,
    next_batch_id: DbId,
    next_log_id: DbId,
    fail_log_appends: bool,
    fail_status_updates: bool,
    failing_statuses: Vec<BatchStatus>,
}

impl ChangeState {
    fn check_status_update(&self, to: BatchStatus) -> StoreResult<()> {
        if self.fail_status_updates || self.failing_statuses.contains(&to) {
            return Err(StorageError::new(format!(
                "injected status update failure (to {to})"
            )));
        }
        Ok(())
    }
}

/// Batch and log store held in memory.
#[derive(Default)]
pub struct MemoryChangeStore {
    state: RwLock<ChangeState>,
}

impl MemoryChangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `append_many` fail.
    pub async fn fail_log_appends(&self, fail: bool) {
        self.state.write().await.fail_log_appends = fail;
    }

    /// Make every subsequent status update or transition fail.
    pub async fn fail_status_updates(&self, fail: bool) {
        self.state.write().await.fail_status_updates = fail;
    }

    /// Make status updates and transitions *to* any of `statuses` fail.
    pub async fn fail_status_updates_to(&self, statuses: &[BatchStatus]) {
        self.state.write().await.failing_statuses = statuses.to_vec();
    }

    /// Number of batches stored.
    pub async fn batch_count(&self) -> usize {
        self.state.read().await.batches.len()
    }

    /// Number of logs stored.
    pub async fn log_count(&self) -> usize {
        self.state.read().await.logs.len()
    }
}

#[async_trait]
impl BatchStore for MemoryChangeStore {
    async fn create(&self, input: &NewChangeBatch) -> StoreResult<ChangeBatch> {
        let mut state = self.state.write().await;
        if let Some(reverted) = input.reverted_batch_id {
            if !state.batches.iter().any(|b| b.id == reverted) {
                return Err(StorageError::new(format!(
                    "reverted_batch_id {reverted} references a missing batch"
                )));
            }
        }
        state.next_batch_id += 1;
        let batch = ChangeBatch {
            id: state.next_batch_id,
            status: input.status,
            scheduled_for: input.scheduled_for,
            completed_at: input.completed_at,
            description: input.description.clone(),
            reverted_batch_id: input.reverted_batch_id,
            submitter_id: input.submitter_id,
            created_at: Utc::now(),
        };
        state.batches.push(batch.clone());
        Ok(batch)
    }

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<ChangeBatch>> {
        let state = self.state.read().await;
        Ok(state.batches.iter().find(|b| b.id == id).cloned())
    }

    async fn update_status(
        &self,
        id: DbId,
        status: BatchStatus,
        completed_at: Option<Timestamp>,
    ) -> StoreResult<Option<ChangeBatch>> {
        let mut state = self.state.write().await;
        state.check_status_update(status)?;
        Ok(state.batches.iter_mut().find(|b| b.id == id).map(|b| {
            b.status = status;
            if completed_at.is_some() {
                b.completed_at = completed_at;
            }
            b.clone()
        }))
    }

    async fn transition_status(
        &self,
        id: DbId,
        from: &[BatchStatus],
        to: BatchStatus,
        completed_at: Option<Timestamp>,
    ) -> StoreResult<Option<ChangeBatch>> {
        let mut state = self.state.write().await;
        state.check_status_update(to)?;
        Ok(state
            .batches
            .iter_mut()
            .find(|b| b.id == id && from.contains(&b.status))
            .map(|b| {
                b.status = to;
                if completed_at.is_some() {
                    b.completed_at = completed_at;
                }
                b.clone()
            }))
    }

    async fn list(&self, filter: &BatchFilter) -> StoreResult<Vec<ChangeBatch>> {
        let state = self.state.read().await;
        let mut batches: Vec<ChangeBatch> = state
            .batches
            .iter()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();

        match filter.order {
            BatchOrder::NewestFirst => {
                batches.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)))
            }
            BatchOrder::ScheduledSoonest => batches
                .sort_by(|a, b| a.scheduled_for.cmp(&b.scheduled_for).then(a.id.cmp(&b.id))),
        }

        Ok(batches
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect())
    }
}

#[async_trait]
impl LogStore for MemoryChangeStore {
    async fn append_many(
        &self,
        batch_id: DbId,
        entries: &[NewChangeLog],
    ) -> StoreResult<Vec<ChangeLog>> {
        let mut state = self.state.write().await;
        if state.fail_log_appends {
            return Err(StorageError::new("injected log append failure"));
        }
        if !state.batches.iter().any(|b| b.id == batch_id) {
            return Err(StorageError::new(format!(
                "batch_id {batch_id} references a missing batch"
            )));
        }

        // Same guarantee as the partial unique index on reverted_log_id.
        let mut reverted: HashSet<DbId> =
            state.logs.iter().filter_map(|l| l.reverted_log_id).collect();
        for entry in entries {
            if let Some(target) = entry.reverted_log_id {
                if !reverted.insert(target) {
                    return Err(StorageError::UniqueViolation {
                        constraint: UQ_REVERTED_LOG.to_string(),
                    });
                }
            }
        }

        let now = Utc::now();
        let mut created = Vec::with_capacity(entries.len());
        for entry in entries {
            state.next_log_id += 1;
            let log = ChangeLog {
                id: state.next_log_id,
                batch_id,
                entity_id: entry.entity_id.clone(),
                attribute_name: entry.attribute_name.clone(),
                old_value: entry.old_value.clone(),
                new_value: entry.new_value.clone(),
                reverted_log_id: entry.reverted_log_id,
                created_at: now,
            };
            state.logs.push(log.clone());
            created.push(log);
        }
        Ok(created)
    }

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<ChangeLog>> {
        let state = self.state.read().await;
        Ok(state.logs.iter().find(|l| l.id == id).cloned())
    }

    async fn list_by_batch(&self, batch_id: DbId) -> StoreResult<Vec<ChangeLog>> {
        let state = self.state.read().await;
        Ok(state
            .logs
            .iter()
            .filter(|l| l.batch_id == batch_id)
            .cloned()
            .collect())
    }

    async fn find_reverting(&self, log_id: DbId) -> StoreResult<Option<ChangeLog>> {
        let state = self.state.read().await;
        Ok(state
            .logs
            .iter()
            .find(|l| l.reverted_log_id == Some(log_id))
            .cloned())
    }

    async fn already_reverted(&self, log_ids: &[DbId]) -> StoreResult<HashSet<DbId>> {
        let state = self.state.read().await;
        Ok(state
            .logs
            .iter()
            .filter_map(|l| l.reverted_log_id)
            .filter(|id| log_ids.contains(id))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryEntityStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct EntityState {
    entities: HashMap<EntityId, AttributeMap>,
    failing_reads: HashSet<EntityId>,
    failing_writes: HashSet<EntityId>,
    write_delay: Option<Duration>,
    writes: usize,
}

/// Entity store held in memory. Writes to unknown entities fail.
#[derive(Default)]
pub struct MemoryEntityStore {
    state: RwLock<EntityState>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entity.
    pub async fn insert(&self, entity_id: &str, values: AttributeMap) {
        self.state
            .write()
            .await
            .entities
            .insert(entity_id.to_string(), values);
    }

    /// Snapshot of an entity's attributes.
    pub async fn get(&self, entity_id: &str) -> Option<AttributeMap> {
        self.state.read().await.entities.get(entity_id).cloned()
    }

    pub async fn fail_reads_for(&self, entity_id: &str) {
        self.state
            .write()
            .await
            .failing_reads
            .insert(entity_id.to_string());
    }

    pub async fn fail_writes_for(&self, entity_id: &str) {
        self.state
            .write()
            .await
            .failing_writes
            .insert(entity_id.to_string());
    }

    /// Delay every write, to exercise entity-store timeouts.
    pub async fn delay_writes(&self, delay: Duration) {
        self.state.write().await.write_delay = Some(delay);
    }

    /// Number of write calls received (successful or not).
    pub async fn write_count(&self) -> usize {
        self.state.read().await.writes
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn read(
        &self,
        entity_id: &str,
        attributes: &[String],
    ) -> Result<Option<AttributeMap>, EntityStoreError> {
        let state = self.state.read().await;
        if state.failing_reads.contains(entity_id) {
            return Err(EntityStoreError::Backend(format!(
                "injected read failure for '{entity_id}'"
            )));
        }
        Ok(state.entities.get(entity_id).map(|entity| {
            attributes
                .iter()
                .map(|attr| (attr.clone(), entity.get(attr).cloned().flatten()))
                .collect()
        }))
    }

    async fn write(&self, entity_id: &str, values: &AttributeMap) -> Result<(), EntityStoreError> {
        let delay = {
            let mut state = self.state.write().await;
            state.writes += 1;
            state.write_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.write().await;
        if state.failing_writes.contains(entity_id) {
            return Err(EntityStoreError::Backend(format!(
                "injected write failure for '{entity_id}'"
            )));
        }
        let entity = state
            .entities
            .get_mut(entity_id)
            .ok_or_else(|| EntityStoreError::NotFound(entity_id.to_string()))?;
        for (attr, value) in values {
            entity.insert(attr.clone(), value.clone());
        }
        Ok(())
    }
}
