//! Plan capture through `EXPLAIN (ANALYZE, BUFFERS, FORMAT JSON)`.

use async_trait::async_trait;
use querylens_storage::{PlanCapture, StorageError};
use serde_json::Value;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use tracing::{debug, instrument, warn};

use crate::error::{PG_QUERY_CANCELED, has_pg_error_code};

/// Captures execution plans by running statements under `EXPLAIN ANALYZE`.
///
/// `ANALYZE` really executes the statement, so every capture runs inside a
/// transaction that is rolled back whatever the outcome.
#[derive(Debug, Clone)]
pub struct PostgresPlanCapture {
    pool: PgPool,
    statement_timeout_ms: Option<u64>,
}

impl PostgresPlanCapture {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statement_timeout_ms: None,
        }
    }

    /// Bounds each capture with `SET LOCAL statement_timeout`.
    #[must_use]
    pub fn with_statement_timeout_ms(mut self, timeout: Option<u64>) -> Self {
        self.statement_timeout_ms = timeout;
        self
    }
}

/// Builds the `EXPLAIN` statement for a query.
pub fn explain_statement(sql: &str) -> String {
    let sql = sql.trim().trim_end_matches(';');
    format!("EXPLAIN (ANALYZE, BUFFERS, FORMAT JSON) {sql}")
}

#[async_trait]
impl PlanCapture for PostgresPlanCapture {
    #[instrument(skip(self, sql), fields(sql_len = sql.len()))]
    async fn capture_plan(&self, sql: &str) -> Result<Value, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::connection_error(format!("Failed to begin: {e}")))?;

        if let Some(timeout) = self.statement_timeout_ms {
            query(&format!("SET LOCAL statement_timeout = {timeout}"))
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::plan_capture(format!("Failed to set timeout: {e}")))?;
        }

        let explain_sql = explain_statement(sql);
        let result: Result<(Value,), _> = query_as(&explain_sql).fetch_one(&mut *tx).await;

        if let Err(e) = tx.rollback().await {
            warn!(error = %e, "Failed to roll back plan capture");
        }

        let (plan,) = result.map_err(|e| {
            if has_pg_error_code(&e, PG_QUERY_CANCELED) {
                StorageError::plan_capture(format!("Statement timed out: {e}"))
            } else {
                StorageError::plan_capture(e.to_string())
            }
        })?;

        debug!("Captured execution plan");
        Ok(plan)
    }
}
