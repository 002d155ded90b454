//! Repository for the `change_batches` table.

use amend_core::model::{BatchOrder, NewChangeBatch};
use amend_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::change_batch::ChangeBatchRow;

/// Column list for change_batches queries.
const COLUMNS: &str = "\
    id, status, scheduled_for, completed_at, description, \
    reverted_batch_id, submitter_id, created_at, updated_at";

/// Provides insert, lookup, status, and listing operations for change batches.
pub struct ChangeBatchRepo;

impl ChangeBatchRepo {
    /// Insert a new batch, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &NewChangeBatch,
    ) -> Result<ChangeBatchRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO change_batches \
                (status, scheduled_for, completed_at, description, \
                 reverted_batch_id, submitter_id) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChangeBatchRow>(&query)
            .bind(input.status.as_str())
            .bind(input.scheduled_for)
            .bind(input.completed_at)
            .bind(&input.description)
            .bind(input.reverted_batch_id)
            .bind(input.submitter_id)
            .fetch_one(pool)
            .await
    }

    /// Find a batch by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ChangeBatchRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM change_batches WHERE id = $1");
        sqlx::query_as::<_, ChangeBatchRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Set a batch's status. `completed_at` is only overwritten when given.
    pub async fn update_status(
        pool: &PgPool,
        id: DbId,
        status: &str,
        completed_at: Option<Timestamp>,
    ) -> Result<Option<ChangeBatchRow>, sqlx::Error> {
        let query = format!(
            "UPDATE change_batches \
             SET status = $2, completed_at = COALESCE($3, completed_at), updated_at = NOW() \
             WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChangeBatchRow>(&query)
            .bind(id)
            .bind(status)
            .bind(completed_at)
            .fetch_optional(pool)
            .await
    }

    /// Set a batch's status only if it is currently one of `from`.
    ///
    /// Returns `None` when no row matched.
    pub async fn transition_status(
        pool: &PgPool,
        id: DbId,
        from: &[String],
        to: &str,
        completed_at: Option<Timestamp>,
    ) -> Result<Option<ChangeBatchRow>, sqlx::Error> {
        let query = format!(
            "UPDATE change_batches \
             SET status = $3, completed_at = COALESCE($4, completed_at), updated_at = NOW() \
             WHERE id = $1 AND status = ANY($2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ChangeBatchRow>(&query)
            .bind(id)
            .bind(from)
            .bind(to)
            .bind(completed_at)
            .fetch_optional(pool)
            .await
    }

    /// List batches whose status is in `statuses` (all when empty).
    pub async fn list(
        pool: &PgPool,
        statuses: &[String],
        order: BatchOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ChangeBatchRow>, sqlx::Error> {
        let order_by = match order {
            BatchOrder::NewestFirst => "created_at DESC, id DESC",
            BatchOrder::ScheduledSoonest => "scheduled_for ASC NULLS LAST, id ASC",
        };
        let query = format!(
            "SELECT {COLUMNS} FROM change_batches \
             WHERE cardinality($1::text[]) = 0 OR status = ANY($1) \
             ORDER BY {order_by} \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, ChangeBatchRow>(&query)
            .bind(statuses)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
