//! Change batch statuses, lifecycle rules, and pure helpers.
//!
//! Nothing here touches storage; the engine and the repositories call into
//! these functions with data they already hold.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default maximum number of entities per batch.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Maximum stored description length, in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 255;

/// Default page size for batch listings.
pub const DEFAULT_LIST_LIMIT: i64 = 50;

/// Maximum page size for batch listings.
pub const MAX_LIST_LIMIT: i64 = 500;

/// Status strings (stored in DB).
pub const STATUS_SCHEDULED: &str = "Scheduled";
pub const STATUS_COMPLETED: &str = "Completed";
pub const STATUS_COMPLETED_WITH_ERRORS: &str = "CompletedWithErrors";
pub const STATUS_FAILED: &str = "Failed";
pub const STATUS_CANCELLED: &str = "Cancelled";
pub const STATUS_PENDING_REVERT: &str = "PendingRevert";
pub const STATUS_REVERTED: &str = "Reverted";

/// All valid status strings.
pub const VALID_STATUSES: &[&str] = &[
    STATUS_SCHEDULED,
    STATUS_COMPLETED,
    STATUS_COMPLETED_WITH_ERRORS,
    STATUS_FAILED,
    STATUS_CANCELLED,
    STATUS_PENDING_REVERT,
    STATUS_REVERTED,
];

// ---------------------------------------------------------------------------
// BatchStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a change batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BatchStatus {
    Scheduled,
    Completed,
    CompletedWithErrors,
    Failed,
    Cancelled,
    PendingRevert,
    Reverted,
}

/// Statuses a whole batch may be reverted from.
pub const REVERTABLE_STATUSES: &[BatchStatus] =
    &[BatchStatus::Completed, BatchStatus::CompletedWithErrors];

/// Statuses shown in the audit history (everything not waiting on something).
pub const HISTORY_STATUSES: &[BatchStatus] = &[
    BatchStatus::Completed,
    BatchStatus::CompletedWithErrors,
    BatchStatus::Failed,
    BatchStatus::Cancelled,
    BatchStatus::Reverted,
];

impl BatchStatus {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        match s {
            STATUS_SCHEDULED => Ok(Self::Scheduled),
            STATUS_COMPLETED => Ok(Self::Completed),
            STATUS_COMPLETED_WITH_ERRORS => Ok(Self::CompletedWithErrors),
            STATUS_FAILED => Ok(Self::Failed),
            STATUS_CANCELLED => Ok(Self::Cancelled),
            STATUS_PENDING_REVERT => Ok(Self::PendingRevert),
            STATUS_REVERTED => Ok(Self::Reverted),
            _ => Err(format!(
                "Invalid status '{s}'. Must be one of: {}",
                VALID_STATUSES.join(", ")
            )),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => STATUS_SCHEDULED,
            Self::Completed => STATUS_COMPLETED,
            Self::CompletedWithErrors => STATUS_COMPLETED_WITH_ERRORS,
            Self::Failed => STATUS_FAILED,
            Self::Cancelled => STATUS_CANCELLED,
            Self::PendingRevert => STATUS_PENDING_REVERT,
            Self::Reverted => STATUS_REVERTED,
        }
    }

    /// Whether the batch has reached an outcome and will not run again.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Scheduled | Self::PendingRevert)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Only a batch that has not executed yet can be cancelled.
pub fn can_cancel(status: BatchStatus) -> bool {
    status == BatchStatus::Scheduled
}

/// Whether a whole batch can be reverted from this status.
pub fn can_revert(status: BatchStatus) -> bool {
    REVERTABLE_STATUSES.contains(&status)
}

/// Whether a single log of a batch in this status can be reverted.
///
/// Logs of batches that never ran carry no old value, so only batches whose
/// writes happened qualify. A batch already reverted as a whole still
/// qualifies; its individually reverted logs are caught by the log guard.
pub fn can_revert_log_of(status: BatchStatus) -> bool {
    can_revert(status) || status == BatchStatus::Reverted
}

/// Aggregate per-entity write outcomes into a batch status.
///
/// Any failed write makes the batch `CompletedWithErrors`; writes are never
/// retried.
pub fn aggregate_write_status(succeeded: usize, failed: usize) -> BatchStatus {
    if failed == 0 && succeeded > 0 {
        BatchStatus::Completed
    } else {
        BatchStatus::CompletedWithErrors
    }
}

/// Parse a comma-separated status list (`Completed,Reverted`).
pub fn parse_status_list(raw: &str) -> Result<Vec<BatchStatus>, CoreError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| BatchStatus::from_str_value(s).map_err(CoreError::Validation))
        .collect()
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Predefined batch listings used by the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchView {
    /// Pending scheduled batches, soonest first.
    Scheduled,
    /// Finished batches, newest first.
    History,
}

impl BatchView {
    pub fn statuses(&self) -> &'static [BatchStatus] {
        match self {
            Self::Scheduled => &[BatchStatus::Scheduled],
            Self::History => HISTORY_STATUSES,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate batch size is within allowed bounds.
pub fn validate_batch_size(count: usize, max: usize) -> Result<(), CoreError> {
    if count == 0 {
        return Err(CoreError::Validation(
            "At least one entity id is required".to_string(),
        ));
    }
    if count > max {
        return Err(CoreError::Validation(format!(
            "Batch size {count} exceeds maximum of {max}"
        )));
    }
    Ok(())
}

/// Clamp a user-provided page size to `[1, max]`.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

/// Clamp a user-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

// ---------------------------------------------------------------------------
// Descriptions
// ---------------------------------------------------------------------------

fn employees(count: usize) -> String {
    if count == 1 {
        "1 employee".to_string()
    } else {
        format!("{count} employees")
    }
}

/// Summary for an immediately applied batch.
pub fn describe_immediate(count: usize) -> String {
    format!("Immediate bulk edit for {}.", employees(count))
}

/// Summary for a scheduled batch.
pub fn describe_scheduled(count: usize) -> String {
    format!("Scheduled bulk edit for {}.", employees(count))
}

/// Summary for a whole-batch revert, truncated to the stored length.
pub fn describe_batch_revert(batch_id: DbId, original: &str) -> String {
    truncate_description(&format!("Revert of Batch #{batch_id}: {original}"))
}

/// Summary for a single-log revert.
pub fn describe_log_revert(log_id: DbId, batch_id: DbId) -> String {
    format!("Single Revert of Log #{log_id} (Batch #{batch_id})")
}

/// Truncate to [`MAX_DESCRIPTION_LENGTH`] characters on a char boundary.
pub fn truncate_description(text: &str) -> String {
    text.chars().take(MAX_DESCRIPTION_LENGTH).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip() {
        for s in VALID_STATUSES {
            assert_eq!(BatchStatus::from_str_value(s).unwrap().as_str(), *s);
        }
    }

    #[test]
    fn status_from_str_invalid() {
        let result = BatchStatus::from_str_value("Pending");
        assert!(result.unwrap_err().contains("Invalid status"));
    }

    #[test]
    fn status_serializes_as_stored_name() {
        let json = serde_json::to_value(BatchStatus::CompletedWithErrors).unwrap();
        assert_eq!(json, serde_json::json!("CompletedWithErrors"));
    }

    #[test]
    fn only_scheduled_can_be_cancelled() {
        assert!(can_cancel(BatchStatus::Scheduled));
        assert!(!can_cancel(BatchStatus::Cancelled));
        assert!(!can_cancel(BatchStatus::Completed));
    }

    #[test]
    fn revertable_statuses() {
        assert!(can_revert(BatchStatus::Completed));
        assert!(can_revert(BatchStatus::CompletedWithErrors));
        assert!(!can_revert(BatchStatus::Reverted));
        assert!(!can_revert(BatchStatus::Failed));
        assert!(!can_revert(BatchStatus::Scheduled));
        assert!(!can_revert(BatchStatus::PendingRevert));
    }

    #[test]
    fn single_log_revert_requires_a_batch_that_ran() {
        assert!(can_revert_log_of(BatchStatus::Completed));
        assert!(can_revert_log_of(BatchStatus::CompletedWithErrors));
        assert!(can_revert_log_of(BatchStatus::Reverted));
        assert!(!can_revert_log_of(BatchStatus::Scheduled));
        assert!(!can_revert_log_of(BatchStatus::Cancelled));
        assert!(!can_revert_log_of(BatchStatus::Failed));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!BatchStatus::Scheduled.is_terminal());
        assert!(!BatchStatus::PendingRevert.is_terminal());
        assert!(BatchStatus::Cancelled.is_terminal());
    }

    #[test]
    fn aggregate_all_succeeded() {
        assert_eq!(aggregate_write_status(3, 0), BatchStatus::Completed);
    }

    #[test]
    fn aggregate_mixed() {
        assert_eq!(aggregate_write_status(2, 1), BatchStatus::CompletedWithErrors);
    }

    #[test]
    fn aggregate_nothing_succeeded() {
        assert_eq!(aggregate_write_status(0, 2), BatchStatus::CompletedWithErrors);
        assert_eq!(aggregate_write_status(0, 0), BatchStatus::CompletedWithErrors);
    }

    #[test]
    fn parse_status_list_accepts_commas_and_spaces() {
        let list = parse_status_list("Completed, Reverted,").unwrap();
        assert_eq!(list, vec![BatchStatus::Completed, BatchStatus::Reverted]);
        assert!(parse_status_list("Done").is_err());
    }

    #[test]
    fn history_view_excludes_pending_statuses() {
        let statuses = BatchView::History.statuses();
        assert!(!statuses.contains(&BatchStatus::Scheduled));
        assert!(!statuses.contains(&BatchStatus::PendingRevert));
        assert_eq!(BatchView::Scheduled.statuses(), &[BatchStatus::Scheduled]);
    }

    #[test]
    fn batch_size_bounds() {
        assert!(validate_batch_size(1, 10).is_ok());
        assert!(validate_batch_size(10, 10).is_ok());
        assert!(validate_batch_size(0, 10).is_err());
        assert!(validate_batch_size(11, 10).is_err());
    }

    #[test]
    fn clamp_pagination() {
        assert_eq!(clamp_limit(None, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT), 50);
        assert_eq!(clamp_limit(Some(0), DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT), 1);
        assert_eq!(clamp_limit(Some(9999), DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT), 500);
        assert_eq!(clamp_offset(Some(-4)), 0);
    }

    #[test]
    fn descriptions() {
        assert_eq!(describe_immediate(2), "Immediate bulk edit for 2 employees.");
        assert_eq!(describe_scheduled(1), "Scheduled bulk edit for 1 employee.");
        assert_eq!(describe_log_revert(7, 3), "Single Revert of Log #7 (Batch #3)");
    }

    #[test]
    fn batch_revert_description_is_truncated() {
        let long = "x".repeat(400);
        let desc = describe_batch_revert(12, &long);
        assert!(desc.starts_with("Revert of Batch #12: "));
        assert_eq!(desc.chars().count(), MAX_DESCRIPTION_LENGTH);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "é".repeat(300);
        assert_eq!(truncate_description(&text).chars().count(), MAX_DESCRIPTION_LENGTH);
    }
}
