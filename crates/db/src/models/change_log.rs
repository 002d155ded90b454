use amend_core::model::ChangeLog;
use amend_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// A row from the `change_logs` table. Immutable once created (no updated_at).
#[derive(Debug, Clone, FromRow)]
pub struct ChangeLogRow {
    pub id: DbId,
    pub batch_id: DbId,
    pub entity_id: String,
    pub attribute_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub reverted_log_id: Option<DbId>,
    pub created_at: Timestamp,
}

impl From<ChangeLogRow> for ChangeLog {
    fn from(row: ChangeLogRow) -> Self {
        ChangeLog {
            id: row.id,
            batch_id: row.batch_id,
            entity_id: row.entity_id,
            attribute_name: row.attribute_name,
            old_value: row.old_value,
            new_value: row.new_value,
            reverted_log_id: row.reverted_log_id,
            created_at: row.created_at,
        }
    }
}
