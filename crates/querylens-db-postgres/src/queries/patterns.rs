//! Pattern upserts and pattern-level reads.

use chrono::{DateTime, Utc};
use querylens_core::{PatternId, QueryPattern};
use querylens_storage::{CandidateThresholds, SlowQueryCandidate, StorageError};
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::{PgPool, PgTransaction};

use super::sql_limit;
use crate::error::query_error;

type PatternRow = (i64, String, String, i64, DateTime<Utc>, DateTime<Utc>);

type CandidateRow = (
    i64,
    String,
    String,
    i64,
    DateTime<Utc>,
    DateTime<Utc>,
    f64,
    i64,
);

const PATTERN_COLUMNS: &str =
    "id, normalized_sql, raw_example_sql, total_executions, first_seen_at, last_seen_at";

fn pattern_from_row(row: PatternRow) -> QueryPattern {
    let (id, normalized_sql, raw_example_sql, total_executions, first_seen_at, last_seen_at) = row;
    QueryPattern {
        id,
        normalized_sql,
        raw_example_sql,
        total_executions,
        first_seen_at,
        last_seen_at,
    }
}

/// Inserts the pattern or bumps its counters, returning its id.
///
/// The unique constraint on `normalized_sql` serializes concurrent first
/// observations: the loser of the race takes the `DO UPDATE` branch and
/// waits on the winner's row lock.
pub async fn upsert(
    tx: &mut PgTransaction<'_>,
    normalized_sql: &str,
    raw_sql: &str,
    seen_at: DateTime<Utc>,
) -> Result<PatternId, StorageError> {
    query_scalar(
        r#"INSERT INTO query_patterns
               (normalized_sql, raw_example_sql, total_executions, first_seen_at, last_seen_at)
           VALUES ($1, $2, 1, $3, $3)
           ON CONFLICT (normalized_sql) DO UPDATE SET
               total_executions = query_patterns.total_executions + 1,
               last_seen_at = GREATEST(query_patterns.last_seen_at, EXCLUDED.last_seen_at),
               raw_example_sql = EXCLUDED.raw_example_sql
           RETURNING id"#,
    )
    .bind(normalized_sql)
    .bind(raw_sql)
    .bind(seen_at)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| query_error("Failed to upsert query pattern", e))
}

/// Reads a pattern by id.
pub async fn get(pool: &PgPool, id: PatternId) -> Result<Option<QueryPattern>, StorageError> {
    let sql = format!("SELECT {PATTERN_COLUMNS} FROM query_patterns WHERE id = $1");
    let row: Option<PatternRow> = query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| query_error("Failed to load query pattern", e))?;

    Ok(row.map(pattern_from_row))
}

/// Most recently seen patterns first.
pub async fn recent(pool: &PgPool, limit: usize) -> Result<Vec<QueryPattern>, StorageError> {
    let sql = format!(
        "SELECT {PATTERN_COLUMNS} FROM query_patterns ORDER BY last_seen_at DESC, id DESC LIMIT $1"
    );
    let rows: Vec<PatternRow> = query_as(&sql)
        .bind(sql_limit(limit))
        .fetch_all(pool)
        .await
        .map_err(|e| query_error("Failed to list query patterns", e))?;

    Ok(rows.into_iter().map(pattern_from_row).collect())
}

/// Aggregates execution history into ranked slow-query candidates.
///
/// The ordering matches `querylens_storage::rank_candidates`.
pub async fn slow_query_candidates(
    pool: &PgPool,
    thresholds: &CandidateThresholds,
) -> Result<Vec<SlowQueryCandidate>, StorageError> {
    let rows: Vec<CandidateRow> = query_as(
        r#"SELECT p.id, p.normalized_sql, p.raw_example_sql, p.total_executions,
                  p.first_seen_at, p.last_seen_at,
                  AVG(e.duration_ms) AS avg_duration_ms,
                  COUNT(*) AS execution_count
           FROM query_patterns p
           JOIN query_executions e ON e.pattern_id = p.id
           GROUP BY p.id
           HAVING AVG(e.duration_ms) >= $1 AND COUNT(*) >= $2
           ORDER BY avg_duration_ms DESC, execution_count DESC, p.first_seen_at ASC, p.id ASC
           LIMIT $3"#,
    )
    .bind(thresholds.slow_query_ms)
    .bind(thresholds.min_executions)
    .bind(sql_limit(thresholds.limit))
    .fetch_all(pool)
    .await
    .map_err(|e| query_error("Failed to select slow query candidates", e))?;

    Ok(rows
        .into_iter()
        .map(|(id, normalized, raw, total, first, last, avg, count)| SlowQueryCandidate {
            pattern: pattern_from_row((id, normalized, raw, total, first, last)),
            avg_duration_ms: avg,
            execution_count: count,
        })
        .collect())
}

/// Deletes a pattern; executions, analyses and recommendations cascade.
///
/// Returns `true` if a pattern was deleted.
pub async fn delete(pool: &PgPool, id: PatternId) -> Result<bool, StorageError> {
    let result = sqlx_core::query::query("DELETE FROM query_patterns WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| query_error("Failed to delete query pattern", e))?;

    Ok(result.rows_affected() > 0)
}
