//! Driver adapter that reports every statement to registered listeners.
//!
//! Applications run their statements through [`InstrumentedPool`] instead of
//! the bare `PgPool`. Each listener gets its own [`ExecutionContext`] per
//! statement, `before_execute` runs right before the statement is sent and
//! `after_execute` once the driver has answered.

use std::sync::Arc;

use querylens_core::{
    ExecutionContext, Statement, StatementListener, StatementOutcome, is_read_only_statement,
};
use serde_json::Value;
use sqlx_core::query::Query;
use sqlx_postgres::{PgArguments, PgPool, PgRow, Postgres};

use crate::error::Result;

/// A `PgPool` wrapper that drives [`StatementListener`] hooks.
#[derive(Clone)]
pub struct InstrumentedPool {
    pool: PgPool,
    listeners: Vec<Arc<dyn StatementListener>>,
}

impl InstrumentedPool {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            listeners: Vec::new(),
        }
    }

    /// Registers a listener. Listeners are called in registration order.
    #[must_use]
    pub fn with_listener(mut self, listener: Arc<dyn StatementListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// The wrapped pool. Statements run on it directly are not reported.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs a statement and returns the row count from its command tag.
    ///
    /// A read-only statement sent here is reported as rows returned, anything
    /// else as rows affected. Prefer [`fetch_all`](Self::fetch_all) for reads.
    ///
    /// # Errors
    ///
    /// Returns the driver error; listeners see it as [`StatementOutcome::Failed`].
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let statement = Statement::with_params(sql, params);
        let contexts = self.before(&statement);

        let result = bind_params(sql, params).execute(&self.pool).await;
        let outcome = match &result {
            Ok(done) => execute_outcome(sql, done.rows_affected()),
            Err(e) => StatementOutcome::Failed(e.to_string()),
        };

        self.after(&contexts, &statement, &outcome).await;
        Ok(result?.rows_affected())
    }

    /// Runs a query and returns every row.
    ///
    /// # Errors
    ///
    /// Returns the driver error; listeners see it as [`StatementOutcome::Failed`].
    pub async fn fetch_all(&self, sql: &str, params: &[Value]) -> Result<Vec<PgRow>> {
        let statement = Statement::with_params(sql, params);
        let contexts = self.before(&statement);

        let result = bind_params(sql, params).fetch_all(&self.pool).await;
        let outcome = match &result {
            Ok(rows) => StatementOutcome::Rows(rows.len() as u64),
            Err(e) => StatementOutcome::Failed(e.to_string()),
        };

        self.after(&contexts, &statement, &outcome).await;
        Ok(result?)
    }

    fn before(&self, statement: &Statement<'_>) -> Vec<ExecutionContext> {
        self.listeners
            .iter()
            .map(|listener| {
                let mut ctx = ExecutionContext::new();
                listener.before_execute(&mut ctx, statement);
                ctx
            })
            .collect()
    }

    async fn after(
        &self,
        contexts: &[ExecutionContext],
        statement: &Statement<'_>,
        outcome: &StatementOutcome,
    ) {
        for (listener, ctx) in self.listeners.iter().zip(contexts) {
            listener.after_execute(ctx, statement, outcome).await;
        }
    }
}

impl std::fmt::Debug for InstrumentedPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentedPool")
            .field("pool", &self.pool)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

fn execute_outcome(sql: &str, rows: u64) -> StatementOutcome {
    if is_read_only_statement(sql) {
        StatementOutcome::Rows(rows)
    } else {
        StatementOutcome::Affected(rows)
    }
}

/// Binds JSON parameters by their JSON type.
///
/// Integers bind as `BIGINT`, other numbers as `DOUBLE PRECISION`, strings as
/// `TEXT`, booleans as `BOOLEAN`, arrays and objects as `JSONB`.
fn bind_params<'q>(sql: &'q str, params: &'q [Value]) -> Query<'q, Postgres, PgArguments> {
    params
        .iter()
        .fold(sqlx_core::query::query::<Postgres>(sql), |query, param| {
            match param {
                Value::Null => query.bind(None::<String>),
                Value::Bool(b) => query.bind(*b),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => query.bind(i),
                    None => query.bind(n.as_f64()),
                },
                Value::String(s) => query.bind(s.as_str()),
                other => query.bind(other),
            }
        })
}
