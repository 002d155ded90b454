//! Repository for the `employees` table.
//!
//! Attribute columns are addressed dynamically. Callers must only pass column
//! names checked against the attribute dictionary; they are interpolated into
//! SQL, while values always travel as a bound JSON parameter.

use sqlx::PgPool;

/// Provides record reads and column updates for employees.
pub struct EmployeeRepo;

impl EmployeeRepo {
    /// Insert an employee with every attribute null.
    pub async fn create(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO employees (id) VALUES ($1)")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// The full row as a JSON object keyed by column name.
    pub async fn find_record(
        pool: &PgPool,
        id: &str,
    ) -> Result<Option<serde_json::Value>, sqlx::Error> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT to_jsonb(e) FROM employees e WHERE e.id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|(record,)| record))
    }

    /// Update `columns` from the matching keys of `values` in one statement.
    ///
    /// Values are cast to each column's type by `jsonb_populate_record`.
    /// Returns the number of rows updated (0 when the employee is missing).
    pub async fn update_columns(
        pool: &PgPool,
        id: &str,
        columns: &[&str],
        values: &serde_json::Value,
    ) -> Result<u64, sqlx::Error> {
        let assignments = columns
            .iter()
            .map(|col| format!("{col} = r.{col}"))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "UPDATE employees e SET {assignments}, updated_at = NOW() \
             FROM jsonb_populate_record(NULL::employees, $2) r \
             WHERE e.id = $1"
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(values)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
