//! Statement lifecycle hooks.
//!
//! Driver adapters call registered [`StatementListener`]s before and after
//! every statement they run. Listeners never see the driver itself, only the
//! statement text, its bound parameters and the outcome, so anything built on
//! these hooks works with whichever adapter is in use.

use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

/// A statement about to run, or that just ran.
#[derive(Debug, Clone, Copy)]
pub struct Statement<'a> {
    pub sql: &'a str,
    pub params: &'a [Value],
}

impl<'a> Statement<'a> {
    /// A statement without bound parameters.
    #[must_use]
    pub fn new(sql: &'a str) -> Self {
        Self { sql, params: &[] }
    }

    /// A statement with bound parameters.
    #[must_use]
    pub fn with_params(sql: &'a str, params: &'a [Value]) -> Self {
        Self { sql, params }
    }
}

/// How a statement finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementOutcome {
    /// A read that returned this many rows.
    Rows(u64),
    /// A write that changed this many rows.
    Affected(u64),
    /// The driver reported an error.
    Failed(String),
}

/// State carried through one in-flight statement execution.
///
/// Adapters create a fresh context per statement and hand the same value to
/// the `before` and `after` callbacks.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    started_at: Option<Instant>,
}

impl ExecutionContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the start instant; the first call wins.
    pub fn mark_started(&mut self) {
        self.started_at.get_or_insert_with(Instant::now);
    }

    #[must_use]
    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Milliseconds since [`mark_started`](Self::mark_started), if it was called.
    #[must_use]
    pub fn elapsed_ms(&self) -> Option<f64> {
        self.started_at
            .map(|start| start.elapsed().as_secs_f64() * 1000.0)
    }
}

/// Callbacks invoked around every statement a driver adapter executes.
#[async_trait]
pub trait StatementListener: Send + Sync {
    /// Called immediately before the statement is sent.
    fn before_execute(&self, ctx: &mut ExecutionContext, statement: &Statement<'_>);

    /// Called once the statement has finished, successfully or not.
    ///
    /// Implementations must not fail the statement: errors are theirs to absorb.
    async fn after_execute(
        &self,
        ctx: &ExecutionContext,
        statement: &Statement<'_>,
        outcome: &StatementOutcome,
    );
}
