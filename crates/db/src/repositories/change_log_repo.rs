//! Repository for the `change_logs` table. Append-only.

use amend_core::model::NewChangeLog;
use amend_core::types::DbId;
use sqlx::PgPool;

use crate::models::change_log::ChangeLogRow;

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

/// Column list for `change_logs` SELECT queries.
const COLUMNS: &str = "\
    id, batch_id, entity_id, attribute_name, old_value, \
    new_value, reverted_log_id, created_at";

/// Column list for INSERT (excludes generated `id` and `created_at`).
const INSERT_COLUMNS: &str = "\
    batch_id, entity_id, attribute_name, old_value, new_value, reverted_log_id";

const INSERT_COLUMN_COUNT: usize = 6;

/// Rows per INSERT statement; keeps bind parameters under Postgres' 65535 limit.
const ROWS_PER_INSERT: usize = 1000;

// ---------------------------------------------------------------------------
// ChangeLogRepo
// ---------------------------------------------------------------------------

/// Provides append and query operations for change logs.
pub struct ChangeLogRepo;

impl ChangeLogRepo {
    /// Insert all entries under one batch in a single transaction.
    ///
    /// Uses multi-row INSERT statements; either every row lands or none do.
    pub async fn batch_insert(
        pool: &PgPool,
        batch_id: DbId,
        entries: &[NewChangeLog],
    ) -> Result<Vec<ChangeLogRow>, sqlx::Error> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = pool.begin().await?;
        let mut created = Vec::with_capacity(entries.len());

        for chunk in entries.chunks(ROWS_PER_INSERT) {
            let query = multi_row_insert(chunk.len());
            let mut q = sqlx::query_as::<_, ChangeLogRow>(&query);
            for entry in chunk {
                q = q
                    .bind(batch_id)
                    .bind(&entry.entity_id)
                    .bind(&entry.attribute_name)
                    .bind(&entry.old_value)
                    .bind(&entry.new_value)
                    .bind(entry.reverted_log_id);
            }
            created.extend(q.fetch_all(&mut *tx).await?);
        }

        tx.commit().await?;
        created.sort_by_key(|row| row.id);
        Ok(created)
    }

    /// Find a log by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ChangeLogRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM change_logs WHERE id = $1");
        sqlx::query_as::<_, ChangeLogRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List the logs of a batch in insertion order.
    pub async fn list_by_batch(
        pool: &PgPool,
        batch_id: DbId,
    ) -> Result<Vec<ChangeLogRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM change_logs WHERE batch_id = $1 ORDER BY id ASC");
        sqlx::query_as::<_, ChangeLogRow>(&query)
            .bind(batch_id)
            .fetch_all(pool)
            .await
    }

    /// Find the log that reverts `log_id`, if any.
    pub async fn find_reverting(
        pool: &PgPool,
        log_id: DbId,
    ) -> Result<Option<ChangeLogRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM change_logs WHERE reverted_log_id = $1");
        sqlx::query_as::<_, ChangeLogRow>(&query)
            .bind(log_id)
            .fetch_optional(pool)
            .await
    }

    /// Return which of `log_ids` are already reverted by some log.
    pub async fn reverted_among(pool: &PgPool, log_ids: &[DbId]) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT reverted_log_id FROM change_logs WHERE reverted_log_id = ANY($1)",
        )
        .bind(log_ids)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

/// Build `INSERT ... VALUES ($1, ..), ($7, ..) RETURNING ...` for `rows` rows.
fn multi_row_insert(rows: usize) -> String {
    let mut query = format!("INSERT INTO change_logs ({INSERT_COLUMNS}) VALUES ");
    let mut param_idx = 1usize;

    for row in 0..rows {
        if row > 0 {
            query.push_str(", ");
        }
        query.push('(');
        for col in 0..INSERT_COLUMN_COUNT {
            if col > 0 {
                query.push_str(", ");
            }
            query.push_str(&format!("${param_idx}"));
            param_idx += 1;
        }
        query.push(')');
    }

    query.push_str(&format!(" RETURNING {COLUMNS}"));
    query
}
