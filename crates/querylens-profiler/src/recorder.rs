//! Execution recording.
//!
//! [`ExecutionRecorder`] implements [`StatementListener`]: a driver adapter
//! calls it around every statement and it records the execution against the
//! statement's normalized pattern.
//!
//! Recording itself goes through storage, and storage may run on an
//! instrumented driver. A task-local flag is set while an observation is
//! being persisted; both hooks return immediately while it is set, so the
//! recorder never observes its own writes.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use querylens_core::{
    ExecutionContext, PatternId, Statement, StatementListener, StatementOutcome, normalize_sql,
};
use querylens_storage::{DynStorage, ErrorCategory, NewExecution, StorageError};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Tables the profiler writes to. Statements touching them are never recorded.
pub const INTERNAL_TABLES: &[&str] = &[
    "query_patterns",
    "query_executions",
    "query_analyses",
    "query_recommendations",
    "_sqlx_migrations",
];

tokio::task_local! {
    static RECORDING: bool;
}

/// Whether the current task is inside a recording scope.
#[must_use]
pub fn is_recording() -> bool {
    RECORDING.try_with(|flag| *flag).unwrap_or(false)
}

/// Runs `fut` with recording suppressed for the current task.
///
/// Statements executed by `fut` reach the listener hooks but are ignored.
/// Tasks spawned from inside `fut` do not inherit the flag.
pub async fn without_recording<F: Future>(fut: F) -> F::Output {
    RECORDING.scope(true, fut).await
}

/// Recorder switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// When false both hooks are no-ops.
    pub enabled: bool,
    /// Table names ignored in addition to [`INTERNAL_TABLES`].
    pub extra_ignored_tables: Vec<String>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extra_ignored_tables: Vec::new(),
        }
    }
}

/// Counters describing what the recorder did with the statements it saw.
#[derive(Debug, Default)]
pub struct RecorderStats {
    /// Executions persisted
    pub recorded: AtomicU64,
    /// Statements skipped because they touch an ignored table
    pub skipped_internal: AtomicU64,
    /// Observations lost to a storage failure
    pub dropped: AtomicU64,
    /// Time spent persisting observations, in microseconds
    pub persist_micros: AtomicU64,
}

impl RecorderStats {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self) -> RecorderStatsSnapshot {
        RecorderStatsSnapshot {
            recorded: self.recorded.load(Ordering::Relaxed),
            skipped_internal: self.skipped_internal.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            persist_micros: self.persist_micros.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time snapshot of recorder statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecorderStatsSnapshot {
    pub recorded: u64,
    pub skipped_internal: u64,
    pub dropped: u64,
    pub persist_micros: u64,
}

impl RecorderStatsSnapshot {
    /// Mean persistence cost per attempted observation, in milliseconds.
    #[must_use]
    pub fn mean_persist_ms(&self) -> f64 {
        let attempts = self.recorded + self.dropped;
        if attempts == 0 {
            0.0
        } else {
            self.persist_micros as f64 / attempts as f64 / 1000.0
        }
    }
}

/// Records every observed statement as an execution of its pattern.
pub struct ExecutionRecorder {
    storage: DynStorage,
    config: RecorderConfig,
    /// Lowercased ignore list: built-in tables plus configured extras.
    ignored: Vec<String>,
    stats: Arc<RecorderStats>,
}

impl ExecutionRecorder {
    pub fn new(storage: DynStorage, config: RecorderConfig) -> Self {
        let ignored = INTERNAL_TABLES
            .iter()
            .map(|t| (*t).to_string())
            .chain(
                config
                    .extra_ignored_tables
                    .iter()
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty()),
            )
            .collect();

        Self {
            storage,
            config,
            ignored,
            stats: Arc::new(RecorderStats::default()),
        }
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Get a snapshot of the recorder's counters.
    pub fn stats(&self) -> RecorderStatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether the statement references a table the recorder ignores.
    pub fn is_internal(&self, sql: &str) -> bool {
        let lowered = sql.to_lowercase();
        self.ignored.iter().any(|table| lowered.contains(table.as_str()))
    }

    fn active(&self) -> bool {
        self.config.enabled && !is_recording()
    }

    async fn persist(
        &self,
        sql: &str,
        duration_ms: f64,
        outcome: &StatementOutcome,
    ) -> Result<PatternId, StorageError> {
        let execution =
            NewExecution::from_outcome(normalize_sql(sql), sql, Utc::now(), duration_ms, outcome);
        self.storage.record_execution(&execution).await
    }
}

impl std::fmt::Debug for ExecutionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionRecorder")
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

#[async_trait]
impl StatementListener for ExecutionRecorder {
    fn before_execute(&self, ctx: &mut ExecutionContext, _statement: &Statement<'_>) {
        if !self.active() {
            return;
        }
        ctx.mark_started();
    }

    async fn after_execute(
        &self,
        ctx: &ExecutionContext,
        statement: &Statement<'_>,
        outcome: &StatementOutcome,
    ) {
        if !self.active() {
            return;
        }

        let Some(duration_ms) = ctx.elapsed_ms() else {
            return;
        };

        if self.is_internal(statement.sql) {
            self.stats.skipped_internal.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let started = Instant::now();
        let result = without_recording(self.persist(statement.sql, duration_ms, outcome)).await;
        let micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.stats.persist_micros.fetch_add(micros, Ordering::Relaxed);

        match result {
            Ok(pattern_id) => {
                self.stats.recorded.fetch_add(1, Ordering::Relaxed);
                debug!(pattern_id, duration_ms, "Recorded statement execution");
            }
            Err(e) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                match e.category() {
                    ErrorCategory::Infrastructure | ErrorCategory::Transaction => {
                        warn!(error = %e, "Dropped statement observation");
                    }
                    _ => debug!(error = %e, "Dropped statement observation"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use querylens_db_memory::InMemoryStorage;
    use querylens_storage::ProfilerStorage;

    use super::*;
    use crate::test_support::{HookedStorage, run_statement};

    fn recorder_over(storage: DynStorage) -> Arc<ExecutionRecorder> {
        Arc::new(ExecutionRecorder::new(storage, RecorderConfig::default()))
    }

    #[tokio::test]
    async fn test_records_each_execution_against_one_pattern() {
        let storage = Arc::new(InMemoryStorage::new());
        let recorder = recorder_over(storage.clone());

        for id in 1..=5 {
            let sql = format!("SELECT * FROM orders WHERE id = {id}");
            run_statement(recorder.as_ref(), &sql, StatementOutcome::Rows(1)).await;
        }

        let patterns = storage.recent_patterns(10).await.unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].normalized_sql, "SELECT * FROM orders WHERE id = ?");
        assert_eq!(patterns[0].total_executions, 5);
        assert_eq!(patterns[0].raw_example_sql, "SELECT * FROM orders WHERE id = 5");
        assert_eq!(recorder.stats().recorded, 5);
    }

    #[tokio::test]
    async fn test_storage_statements_are_not_recorded_recursively() {
        let storage = Arc::new(HookedStorage::new());
        let recorder = recorder_over(storage.clone());
        storage.attach(recorder.clone());

        run_statement(
            recorder.as_ref(),
            "SELECT name FROM users WHERE id = 7",
            StatementOutcome::Rows(1),
        )
        .await;

        assert_eq!(storage.hook_invocations(), 1);
        assert_eq!(storage.inner().execution_count().await, 1);
        assert_eq!(storage.inner().pattern_count().await, 1);
        assert_eq!(recorder.stats().recorded, 1);
    }

    #[tokio::test]
    async fn test_guard_is_visible_inside_scope_only() {
        assert!(!is_recording());
        let inside = without_recording(async { is_recording() }).await;
        assert!(inside);
        assert!(!is_recording());
    }

    #[tokio::test]
    async fn test_hooks_are_inert_inside_recording_scope() {
        let storage = Arc::new(InMemoryStorage::new());
        let recorder = recorder_over(storage.clone());

        without_recording(run_statement(
            recorder.as_ref(),
            "SELECT 1",
            StatementOutcome::Rows(1),
        ))
        .await;

        assert_eq!(storage.execution_count().await, 0);
        assert_eq!(recorder.stats(), RecorderStats::default().snapshot());
    }

    #[tokio::test]
    async fn test_internal_tables_are_skipped_case_insensitively() {
        let storage = Arc::new(InMemoryStorage::new());
        let recorder = Arc::new(ExecutionRecorder::new(
            storage.clone(),
            RecorderConfig {
                extra_ignored_tables: vec!["Audit_Log".into()],
                ..Default::default()
            },
        ));

        for sql in [
            "SELECT * FROM Query_Patterns WHERE id = 1",
            "INSERT INTO query_executions (pattern_id) VALUES (1)",
            "select version from _SQLX_MIGRATIONS",
            "DELETE FROM audit_log WHERE id = 3",
        ] {
            run_statement(recorder.as_ref(), sql, StatementOutcome::Affected(1)).await;
        }
        run_statement(recorder.as_ref(), "SELECT 1", StatementOutcome::Rows(1)).await;

        let stats = recorder.stats();
        assert_eq!(stats.skipped_internal, 4);
        assert_eq!(stats.recorded, 1);
        assert_eq!(storage.pattern_count().await, 1);
    }

    #[tokio::test]
    async fn test_storage_failure_is_counted_not_propagated() {
        let storage = Arc::new(HookedStorage::failing());
        let recorder = recorder_over(storage.clone());

        run_statement(
            recorder.as_ref(),
            "UPDATE accounts SET balance = 0 WHERE id = 1",
            StatementOutcome::Affected(1),
        )
        .await;

        let stats = recorder.stats();
        assert_eq!(stats.dropped, 1);
        assert_eq!(stats.recorded, 0);
        assert_eq!(storage.inner().execution_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_statements_keep_their_error() {
        let storage = Arc::new(InMemoryStorage::new());
        let recorder = recorder_over(storage.clone());

        run_statement(
            recorder.as_ref(),
            "SELECT * FROM missing WHERE id = 1",
            StatementOutcome::Failed("relation \"missing\" does not exist".into()),
        )
        .await;

        let pattern = &storage.recent_patterns(1).await.unwrap()[0];
        let executions = storage.executions_for_patterns(&[pattern.id]).await.unwrap();
        assert_eq!(
            executions[0].error.as_deref(),
            Some("relation \"missing\" does not exist")
        );
        assert_eq!(executions[0].rows_returned, None);
    }

    #[tokio::test]
    async fn test_disabled_recorder_records_nothing() {
        let storage = Arc::new(InMemoryStorage::new());
        let recorder = ExecutionRecorder::new(
            storage.clone(),
            RecorderConfig {
                enabled: false,
                ..Default::default()
            },
        );

        run_statement(&recorder, "SELECT 1", StatementOutcome::Rows(1)).await;
        assert_eq!(storage.execution_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_start_records_nothing() {
        let storage = Arc::new(InMemoryStorage::new());
        let recorder = recorder_over(storage.clone());

        let ctx = ExecutionContext::new();
        recorder
            .after_execute(&ctx, &Statement::new("SELECT 1"), &StatementOutcome::Rows(1))
            .await;

        assert_eq!(storage.execution_count().await, 0);
    }

    #[tokio::test]
    async fn test_duration_is_measured_between_hooks() {
        let storage = Arc::new(InMemoryStorage::new());
        let recorder = recorder_over(storage.clone());

        let statement = Statement::new("SELECT pg_sleep(0.02)");
        let mut ctx = ExecutionContext::new();
        recorder.before_execute(&mut ctx, &statement);
        tokio::time::sleep(Duration::from_millis(20)).await;
        recorder
            .after_execute(&ctx, &statement, &StatementOutcome::Rows(1))
            .await;

        let pattern = &storage.recent_patterns(1).await.unwrap()[0];
        let executions = storage.executions_for_patterns(&[pattern.id]).await.unwrap();
        assert!(executions[0].duration_ms >= 20.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_statements_share_one_pattern() {
        let storage = Arc::new(HookedStorage::new());
        let recorder = recorder_over(storage.clone());
        storage.attach(recorder.clone());

        let tasks: Vec<_> = (0..32)
            .map(|n| {
                let recorder = recorder.clone();
                tokio::spawn(async move {
                    let sql = format!("SELECT * FROM carts WHERE user_id = {n}");
                    run_statement(recorder.as_ref(), &sql, StatementOutcome::Rows(0)).await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let patterns = storage.inner().recent_patterns(10).await.unwrap();
        assert_eq!(patterns.len(), 1);
        assert_eq!(patterns[0].total_executions, 32);
        assert_eq!(storage.inner().execution_count().await, 32);
        assert_eq!(recorder.stats().recorded, 32);
    }

    #[test]
    fn test_snapshot_mean_persist_time() {
        let snapshot = RecorderStatsSnapshot {
            recorded: 3,
            skipped_internal: 0,
            dropped: 1,
            persist_micros: 8_000,
        };
        assert_eq!(snapshot.mean_persist_ms(), 2.0);
        assert_eq!(RecorderStats::default().snapshot().mean_persist_ms(), 0.0);
    }
}
