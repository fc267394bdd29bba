//! Plan analysis queries.

use chrono::{DateTime, Utc};
use querylens_core::{ExplainPlan, PatternId, PlanAnalysis};
use querylens_storage::{NewPlanAnalysis, StorageError};
use serde_json::Value;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;

use super::sql_limit;
use crate::error::query_error;

type AnalysisRow = (
    i64,
    i64,
    DateTime<Utc>,
    Value,
    Option<f64>,
    Option<f64>,
    bool,
    bool,
);

const ANALYSIS_COLUMNS: &str = "id, pattern_id, executed_at, plan, planning_time_ms, \
     execution_time_ms, seq_scan_detected, index_scan_detected";

fn analysis_from_row(row: AnalysisRow) -> Result<PlanAnalysis, StorageError> {
    let (id, pattern_id, executed_at, plan, planning, execution, seq_scan, index_scan) = row;
    Ok(PlanAnalysis {
        id,
        pattern_id,
        executed_at,
        plan: ExplainPlan::from_json(&plan)?,
        planning_time_ms: planning,
        execution_time_ms: execution,
        seq_scan_detected: seq_scan,
        index_scan_detected: index_scan,
    })
}

fn analyses_from_rows(rows: Vec<AnalysisRow>) -> Result<Vec<PlanAnalysis>, StorageError> {
    rows.into_iter().map(analysis_from_row).collect()
}

/// Persists a captured plan.
pub async fn insert(
    pool: &PgPool,
    analysis: &NewPlanAnalysis,
) -> Result<PlanAnalysis, StorageError> {
    let id: i64 = sqlx_core::query_scalar::query_scalar(
        r#"INSERT INTO query_analyses
               (pattern_id, executed_at, plan, planning_time_ms, execution_time_ms,
                seq_scan_detected, index_scan_detected)
           VALUES ($1, $2, $3, $4, $5, $6, $7)
           RETURNING id"#,
    )
    .bind(analysis.pattern_id)
    .bind(analysis.executed_at)
    .bind(analysis.plan.to_json())
    .bind(analysis.planning_time_ms())
    .bind(analysis.execution_time_ms())
    .bind(analysis.seq_scan_detected)
    .bind(analysis.index_scan_detected)
    .fetch_one(pool)
    .await
    .map_err(|e| query_error("Failed to insert plan analysis", e))?;

    Ok(analysis.clone().into_analysis(id))
}

/// Reads an analysis by id.
pub async fn get(pool: &PgPool, id: i64) -> Result<Option<PlanAnalysis>, StorageError> {
    let sql = format!("SELECT {ANALYSIS_COLUMNS} FROM query_analyses WHERE id = $1");
    let row: Option<AnalysisRow> = query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| query_error("Failed to load plan analysis", e))?;

    row.map(analysis_from_row).transpose()
}

/// Newest analyses across all patterns.
pub async fn latest(pool: &PgPool, limit: usize) -> Result<Vec<PlanAnalysis>, StorageError> {
    let sql = format!(
        "SELECT {ANALYSIS_COLUMNS} FROM query_analyses ORDER BY executed_at DESC, id DESC LIMIT $1"
    );
    let rows: Vec<AnalysisRow> = query_as(&sql)
        .bind(sql_limit(limit))
        .fetch_all(pool)
        .await
        .map_err(|e| query_error("Failed to list plan analyses", e))?;

    analyses_from_rows(rows)
}

/// Every analysis of the given patterns, newest first.
pub async fn for_patterns(
    pool: &PgPool,
    pattern_ids: &[PatternId],
) -> Result<Vec<PlanAnalysis>, StorageError> {
    let sql = format!(
        "SELECT {ANALYSIS_COLUMNS} FROM query_analyses \
         WHERE pattern_id = ANY($1) ORDER BY executed_at DESC, id DESC"
    );
    let rows: Vec<AnalysisRow> = query_as(&sql)
        .bind(pattern_ids)
        .fetch_all(pool)
        .await
        .map_err(|e| query_error("Failed to load plan analyses", e))?;

    analyses_from_rows(rows)
}
