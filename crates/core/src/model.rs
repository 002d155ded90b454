//! Change batch and change log records.
//!
//! Both are append-only. After creation only a batch's `status` and
//! `completed_at` ever change; logs are never updated.

use serde::{Deserialize, Serialize};

use crate::batch::BatchStatus;
use crate::types::{DbId, EntityId, Timestamp};

// ---------------------------------------------------------------------------
// ChangeBatch
// ---------------------------------------------------------------------------

/// One logical unit of attribute changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeBatch {
    pub id: DbId,
    pub status: BatchStatus,
    /// Set iff the batch was created through the scheduled path.
    pub scheduled_for: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub description: String,
    /// When set, this batch is a revert of that batch.
    pub reverted_batch_id: Option<DbId>,
    pub submitter_id: Option<DbId>,
    pub created_at: Timestamp,
}

/// DTO for creating a change batch.
#[derive(Debug, Clone, Deserialize)]
pub struct NewChangeBatch {
    pub status: BatchStatus,
    pub scheduled_for: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub description: String,
    pub reverted_batch_id: Option<DbId>,
    pub submitter_id: Option<DbId>,
}

// ---------------------------------------------------------------------------
// ChangeLog
// ---------------------------------------------------------------------------

/// One recorded mutation of a single attribute on a single entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeLog {
    pub id: DbId,
    pub batch_id: DbId,
    pub entity_id: EntityId,
    pub attribute_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    /// When set, this log is the inverse of that log.
    pub reverted_log_id: Option<DbId>,
    pub created_at: Timestamp,
}

/// DTO for appending a change log under a batch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewChangeLog {
    pub entity_id: EntityId,
    pub attribute_name: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub reverted_log_id: Option<DbId>,
}

impl NewChangeLog {
    /// The inverse of a recorded change: values swapped, linked to the original.
    pub fn inverse_of(log: &ChangeLog) -> Self {
        Self {
            entity_id: log.entity_id.clone(),
            attribute_name: log.attribute_name.clone(),
            old_value: log.new_value.clone(),
            new_value: log.old_value.clone(),
            reverted_log_id: Some(log.id),
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Sort order for batch listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchOrder {
    #[default]
    NewestFirst,
    ScheduledSoonest,
}

/// Filter for listing batches. An empty status list means all statuses.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchFilter {
    pub statuses: Vec<BatchStatus>,
    pub order: BatchOrder,
    pub limit: i64,
    pub offset: i64,
}

impl BatchFilter {
    pub fn matches(&self, batch: &ChangeBatch) -> bool {
        self.statuses.is_empty() || self.statuses.contains(&batch.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_swaps_values_and_links_original() {
        let log = ChangeLog {
            id: 11,
            batch_id: 4,
            entity_id: "e1".into(),
            attribute_name: "department".into(),
            old_value: Some("Sales".into()),
            new_value: Some("Eng".into()),
            reverted_log_id: None,
            created_at: chrono::Utc::now(),
        };

        let inverse = NewChangeLog::inverse_of(&log);
        assert_eq!(inverse.entity_id, "e1");
        assert_eq!(inverse.old_value.as_deref(), Some("Eng"));
        assert_eq!(inverse.new_value.as_deref(), Some("Sales"));
        assert_eq!(inverse.reverted_log_id, Some(11));
    }
}
