use amend_core::batch::BatchStatus;
use amend_core::error::StorageError;
use amend_core::model::ChangeBatch;
use amend_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `change_batches` table.
#[derive(Debug, Clone, FromRow)]
pub struct ChangeBatchRow {
    pub id: DbId,
    pub status: String,
    pub scheduled_for: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub description: String,
    pub reverted_batch_id: Option<DbId>,
    pub submitter_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<ChangeBatchRow> for ChangeBatch {
    type Error = StorageError;

    fn try_from(row: ChangeBatchRow) -> Result<Self, Self::Error> {
        let status = BatchStatus::from_str_value(&row.status).map_err(|e| {
            StorageError::new(format!("change_batches.id={}: {e}", row.id))
        })?;
        Ok(ChangeBatch {
            id: row.id,
            status,
            scheduled_for: row.scheduled_for,
            completed_at: row.completed_at,
            description: row.description,
            reverted_batch_id: row.reverted_batch_id,
            submitter_id: row.submitter_id,
            created_at: row.created_at,
        })
    }
}
