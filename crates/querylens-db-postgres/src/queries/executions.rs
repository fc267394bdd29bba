//! Execution history queries.

use chrono::{DateTime, Utc};
use querylens_core::{ExecutionRecord, PatternId};
use querylens_storage::{NewExecution, StorageError};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::{PgPool, PgTransaction};

use crate::error::query_error;

type ExecutionRow = (
    i64,
    i64,
    DateTime<Utc>,
    f64,
    Option<i64>,
    Option<i64>,
    Option<String>,
);

/// Appends one execution record inside the recording transaction.
pub async fn insert(
    tx: &mut PgTransaction<'_>,
    pattern_id: PatternId,
    execution: &NewExecution,
) -> Result<(), StorageError> {
    query(
        r#"INSERT INTO query_executions
               (pattern_id, executed_at, duration_ms, rows_returned, rows_affected, error)
           VALUES ($1, $2, $3, $4, $5, $6)"#,
    )
    .bind(pattern_id)
    .bind(execution.executed_at)
    .bind(execution.duration_ms)
    .bind(execution.rows_returned)
    .bind(execution.rows_affected)
    .bind(execution.error.as_deref())
    .execute(&mut **tx)
    .await
    .map_err(|e| query_error("Failed to insert query execution", e))?;

    Ok(())
}

/// Every execution of the given patterns, newest first.
pub async fn for_patterns(
    pool: &PgPool,
    pattern_ids: &[PatternId],
) -> Result<Vec<ExecutionRecord>, StorageError> {
    let rows: Vec<ExecutionRow> = query_as(
        r#"SELECT id, pattern_id, executed_at, duration_ms, rows_returned, rows_affected, error
           FROM query_executions
           WHERE pattern_id = ANY($1)
           ORDER BY executed_at DESC, id DESC"#,
    )
    .bind(pattern_ids)
    .fetch_all(pool)
    .await
    .map_err(|e| query_error("Failed to load query executions", e))?;

    Ok(rows
        .into_iter()
        .map(
            |(id, pattern_id, executed_at, duration_ms, rows_returned, rows_affected, error)| {
                ExecutionRecord {
                    id,
                    pattern_id,
                    executed_at,
                    duration_ms,
                    rows_returned,
                    rows_affected,
                    error,
                }
            },
        )
        .collect())
}
