//! Storage traits for the profiler.

use async_trait::async_trait;
use querylens_core::{ExecutionRecord, PatternId, PlanAnalysis, QueryPattern, Recommendation};
use serde_json::Value;

use crate::error::StorageError;
use crate::types::{
    CandidateThresholds, NewExecution, NewPlanAnalysis, NewRecommendation, SlowQueryCandidate,
};

/// The persistence contract every profiler backend implements.
///
/// Implementations must be thread-safe (`Send + Sync`). Every write is
/// atomic: it either fully happens or leaves storage untouched.
///
/// # Example
///
/// ```ignore
/// use querylens_storage::{ProfilerStorage, StorageError};
///
/// async fn pattern_text(storage: &dyn ProfilerStorage, id: i64) -> Result<String, StorageError> {
///     storage
///         .get_pattern(id)
///         .await?
///         .map(|p| p.normalized_sql)
///         .ok_or_else(|| StorageError::not_found("QueryPattern", id))
/// }
/// ```
#[async_trait]
pub trait ProfilerStorage: Send + Sync {
    // ==================== Recording ====================

    /// Upserts the execution's pattern and appends the execution record.
    ///
    /// A new pattern starts with `total_executions = 1`. An existing one has
    /// its counter incremented, `last_seen_at` raised to the execution time if
    /// later, and `raw_example_sql` replaced. Both writes commit together.
    /// Concurrent calls for the same normalized text never create two
    /// patterns or lose an increment.
    ///
    /// Returns the pattern id.
    async fn record_execution(&self, execution: &NewExecution) -> Result<PatternId, StorageError>;

    // ==================== Patterns ====================

    /// Reads a pattern by id. Returns `None` if it does not exist.
    async fn get_pattern(&self, id: PatternId) -> Result<Option<QueryPattern>, StorageError>;

    /// The most recently seen patterns, by `last_seen_at` descending.
    async fn recent_patterns(&self, limit: usize) -> Result<Vec<QueryPattern>, StorageError>;

    /// Patterns that meet both thresholds, ranked as
    /// [`rank_candidates`](crate::rank_candidates) does.
    async fn slow_query_candidates(
        &self,
        thresholds: &CandidateThresholds,
    ) -> Result<Vec<SlowQueryCandidate>, StorageError>;

    // ==================== Analyses ====================

    /// Persists a captured plan.
    async fn insert_analysis(
        &self,
        analysis: &NewPlanAnalysis,
    ) -> Result<PlanAnalysis, StorageError>;

    /// Reads an analysis by id. Returns `None` if it does not exist.
    async fn get_analysis(&self, id: i64) -> Result<Option<PlanAnalysis>, StorageError>;

    /// The newest analyses across all patterns.
    async fn latest_analyses(&self, limit: usize) -> Result<Vec<PlanAnalysis>, StorageError>;

    // ==================== Recommendations ====================

    /// Persists a validated recommendation in a single atomic write.
    async fn insert_recommendation(
        &self,
        recommendation: &NewRecommendation,
    ) -> Result<Recommendation, StorageError>;

    // ==================== Batch reads ====================

    /// Every execution of the given patterns, newest first.
    async fn executions_for_patterns(
        &self,
        pattern_ids: &[PatternId],
    ) -> Result<Vec<ExecutionRecord>, StorageError>;

    /// Every analysis of the given patterns, newest first.
    async fn analyses_for_patterns(
        &self,
        pattern_ids: &[PatternId],
    ) -> Result<Vec<PlanAnalysis>, StorageError>;

    /// Every recommendation for the given patterns, newest first.
    async fn recommendations_for_patterns(
        &self,
        pattern_ids: &[PatternId],
    ) -> Result<Vec<Recommendation>, StorageError>;
}

/// Produces an execution plan for a statement.
#[async_trait]
pub trait PlanCapture: Send + Sync {
    /// Executes the statement under plan instrumentation and returns the raw
    /// plan document.
    ///
    /// The statement really runs. Backends must not let its effects persist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PlanCapture`] if the statement or the
    /// instrumentation fails.
    async fn capture_plan(&self, sql: &str) -> Result<Value, StorageError>;
}
