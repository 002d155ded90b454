//! Persistence and entity-store seams used by the engine.
//!
//! The engine only talks to these traits. `amend-db` implements them over
//! Postgres; [`crate::memory`] implements them in process.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::batch::BatchStatus;
use crate::error::{EntityStoreError, StorageError};
use crate::model::{BatchFilter, ChangeBatch, ChangeLog, NewChangeBatch, NewChangeLog};
use crate::types::{DbId, Timestamp};
use crate::value::AttributeMap;

pub type StoreResult<T> = Result<T, StorageError>;

/// Unique constraint allowing at most one log to revert a given log.
pub const UQ_REVERTED_LOG: &str = "uq_change_logs_reverted_log_id";

/// Change batch persistence.
#[async_trait]
pub trait BatchStore: Send + Sync {
    async fn create(&self, input: &NewChangeBatch) -> StoreResult<ChangeBatch>;

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<ChangeBatch>>;

    /// Unconditionally set status (and `completed_at`, when given).
    async fn update_status(
        &self,
        id: DbId,
        status: BatchStatus,
        completed_at: Option<Timestamp>,
    ) -> StoreResult<Option<ChangeBatch>>;

    /// Set status only if the current status is one of `from`.
    ///
    /// Returns `None` when the batch is missing or in another status.
    async fn transition_status(
        &self,
        id: DbId,
        from: &[BatchStatus],
        to: BatchStatus,
        completed_at: Option<Timestamp>,
    ) -> StoreResult<Option<ChangeBatch>>;

    async fn list(&self, filter: &BatchFilter) -> StoreResult<Vec<ChangeBatch>>;

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Change log persistence (append-only).
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Append all entries under `batch_id`, all or nothing.
    ///
    /// An entry reverting a log that some stored log already reverts fails
    /// with [`StorageError::UniqueViolation`] on [`UQ_REVERTED_LOG`].
    async fn append_many(
        &self,
        batch_id: DbId,
        entries: &[NewChangeLog],
    ) -> StoreResult<Vec<ChangeLog>>;

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<ChangeLog>>;

    /// Logs of one batch, in insertion order.
    async fn list_by_batch(&self, batch_id: DbId) -> StoreResult<Vec<ChangeLog>>;

    /// The log whose `reverted_log_id` points at `log_id`, if any.
    async fn find_reverting(&self, log_id: DbId) -> StoreResult<Option<ChangeLog>>;

    /// The subset of `log_ids` that some log already reverts.
    async fn already_reverted(&self, log_ids: &[DbId]) -> StoreResult<HashSet<DbId>>;
}

/// The external store holding the entities being edited.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Current values of `attributes` on one entity. `Ok(None)` when the
    /// entity does not exist; absent attributes map to `None`.
    async fn read(
        &self,
        entity_id: &str,
        attributes: &[String],
    ) -> Result<Option<AttributeMap>, EntityStoreError>;

    /// Write all `values` to one entity in a single update.
    async fn write(&self, entity_id: &str, values: &AttributeMap) -> Result<(), EntityStoreError>;
}
