//! Postgres-backed implementations of the `amend-core` store traits.

use std::collections::HashSet;
use std::sync::Arc;

use amend_core::attributes::{self, AttributeDictionary};
use amend_core::batch::BatchStatus;
use amend_core::error::{EntityStoreError, StorageError};
use amend_core::model::{BatchFilter, ChangeBatch, ChangeLog, NewChangeBatch, NewChangeLog};
use amend_core::store::{BatchStore, EntityStore, LogStore, StoreResult};
use amend_core::types::{DbId, Timestamp};
use amend_core::value::{AttributeMap, AttributeValue};
use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::change_batch::ChangeBatchRow;
use crate::repositories::{ChangeBatchRepo, ChangeLogRepo, EmployeeRepo};

/// Map a sqlx error to a [`StorageError`].
///
/// Unique violations (code 23505) on a `uq_*` constraint keep the constraint
/// name so the engine can tell a lost race from a broken database.
fn storage(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.code().as_deref() == Some("23505") {
            if let Some(constraint) = db_err.constraint().filter(|c| c.starts_with("uq_")) {
                tracing::warn!(constraint, "Unique constraint rejected change store write");
                return StorageError::UniqueViolation {
                    constraint: constraint.to_string(),
                };
            }
        }
    }
    tracing::error!(error = %e, "Change store query failed");
    StorageError::new(e.to_string())
}

fn to_batch(row: Option<ChangeBatchRow>) -> StoreResult<Option<ChangeBatch>> {
    row.map(ChangeBatch::try_from).transpose()
}

fn status_names(statuses: &[BatchStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

// ---------------------------------------------------------------------------
// PgChangeStore
// ---------------------------------------------------------------------------

/// Change batches and change logs in Postgres.
#[derive(Clone)]
pub struct PgChangeStore {
    pool: PgPool,
}

impl PgChangeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BatchStore for PgChangeStore {
    async fn create(&self, input: &NewChangeBatch) -> StoreResult<ChangeBatch> {
        let row = ChangeBatchRepo::create(&self.pool, input)
            .await
            .map_err(storage)?;
        ChangeBatch::try_from(row)
    }

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<ChangeBatch>> {
        to_batch(
            ChangeBatchRepo::find_by_id(&self.pool, id)
                .await
                .map_err(storage)?,
        )
    }

    async fn update_status(
        &self,
        id: DbId,
        status: BatchStatus,
        completed_at: Option<Timestamp>,
    ) -> StoreResult<Option<ChangeBatch>> {
        to_batch(
            ChangeBatchRepo::update_status(&self.pool, id, status.as_str(), completed_at)
                .await
                .map_err(storage)?,
        )
    }

    async fn transition_status(
        &self,
        id: DbId,
        from: &[BatchStatus],
        to: BatchStatus,
        completed_at: Option<Timestamp>,
    ) -> StoreResult<Option<ChangeBatch>> {
        to_batch(
            ChangeBatchRepo::transition_status(
                &self.pool,
                id,
                &status_names(from),
                to.as_str(),
                completed_at,
            )
            .await
            .map_err(storage)?,
        )
    }

    async fn list(&self, filter: &BatchFilter) -> StoreResult<Vec<ChangeBatch>> {
        ChangeBatchRepo::list(
            &self.pool,
            &status_names(&filter.statuses),
            filter.order,
            filter.limit,
            filter.offset,
        )
        .await
        .map_err(storage)?
        .into_iter()
        .map(ChangeBatch::try_from)
        .collect()
    }

    async fn health_check(&self) -> StoreResult<()> {
        crate::health_check(&self.pool).await.map_err(storage)
    }
}

#[async_trait]
impl LogStore for PgChangeStore {
    async fn append_many(
        &self,
        batch_id: DbId,
        entries: &[NewChangeLog],
    ) -> StoreResult<Vec<ChangeLog>> {
        let rows = ChangeLogRepo::batch_insert(&self.pool, batch_id, entries)
            .await
            .map_err(storage)?;
        Ok(rows.into_iter().map(ChangeLog::from).collect())
    }

    async fn find_by_id(&self, id: DbId) -> StoreResult<Option<ChangeLog>> {
        Ok(ChangeLogRepo::find_by_id(&self.pool, id)
            .await
            .map_err(storage)?
            .map(ChangeLog::from))
    }

    async fn list_by_batch(&self, batch_id: DbId) -> StoreResult<Vec<ChangeLog>> {
        Ok(ChangeLogRepo::list_by_batch(&self.pool, batch_id)
            .await
            .map_err(storage)?
            .into_iter()
            .map(ChangeLog::from)
            .collect())
    }

    async fn find_reverting(&self, log_id: DbId) -> StoreResult<Option<ChangeLog>> {
        Ok(ChangeLogRepo::find_reverting(&self.pool, log_id)
            .await
            .map_err(storage)?
            .map(ChangeLog::from))
    }

    async fn already_reverted(&self, log_ids: &[DbId]) -> StoreResult<HashSet<DbId>> {
        Ok(ChangeLogRepo::reverted_among(&self.pool, log_ids)
            .await
            .map_err(storage)?
            .into_iter()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// PgEmployeeStore
// ---------------------------------------------------------------------------

/// The `employees` table as an entity store.
///
/// Only attributes in the dictionary are read or written; their ids are the
/// column names.
#[derive(Clone)]
pub struct PgEmployeeStore {
    pool: PgPool,
    dictionary: Arc<AttributeDictionary>,
}

impl PgEmployeeStore {
    pub fn new(pool: PgPool, dictionary: Arc<AttributeDictionary>) -> Self {
        Self { pool, dictionary }
    }

    fn ensure_writable(&self, attribute: &str) -> Result<(), EntityStoreError> {
        if self.dictionary.contains(attribute) && attributes::validate_attribute_name(attribute).is_ok()
        {
            Ok(())
        } else {
            Err(EntityStoreError::UnknownAttribute(attribute.to_string()))
        }
    }
}

fn backend(e: sqlx::Error) -> EntityStoreError {
    EntityStoreError::Backend(e.to_string())
}

#[async_trait]
impl EntityStore for PgEmployeeStore {
    async fn read(
        &self,
        entity_id: &str,
        attributes: &[String],
    ) -> Result<Option<AttributeMap>, EntityStoreError> {
        for attribute in attributes {
            self.ensure_writable(attribute)?;
        }
        let Some(record) = EmployeeRepo::find_record(&self.pool, entity_id)
            .await
            .map_err(backend)?
        else {
            return Ok(None);
        };

        Ok(Some(
            attributes
                .iter()
                .map(|attribute| {
                    let value = record.get(attribute).and_then(|v| {
                        AttributeValue::from_json(v, self.dictionary.kind(attribute))
                    });
                    (attribute.clone(), value)
                })
                .collect(),
        ))
    }

    async fn write(&self, entity_id: &str, values: &AttributeMap) -> Result<(), EntityStoreError> {
        if values.is_empty() {
            return Ok(());
        }
        let mut columns = Vec::with_capacity(values.len());
        let mut payload = serde_json::Map::with_capacity(values.len());
        for (attribute, value) in values {
            self.ensure_writable(attribute)?;
            columns.push(attribute.as_str());
            payload.insert(
                attribute.clone(),
                value
                    .as_ref()
                    .map(AttributeValue::to_json)
                    .unwrap_or(serde_json::Value::Null),
            );
        }

        let updated = EmployeeRepo::update_columns(
            &self.pool,
            entity_id,
            &columns,
            &serde_json::Value::Object(payload),
        )
        .await
        .map_err(backend)?;

        if updated == 0 {
            return Err(EntityStoreError::NotFound(entity_id.to_string()));
        }
        tracing::debug!(entity_id, columns = columns.len(), "Employee updated");
        Ok(())
    }
}
