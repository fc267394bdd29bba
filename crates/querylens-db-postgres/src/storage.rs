//! PostgreSQL implementation of the `ProfilerStorage` trait.

use async_trait::async_trait;
use querylens_core::{ExecutionRecord, PatternId, PlanAnalysis, QueryPattern, Recommendation};
use querylens_storage::{
    CandidateThresholds, NewExecution, NewPlanAnalysis, NewRecommendation, ProfilerStorage,
    SlowQueryCandidate, StorageError,
};
use sqlx_postgres::PgPool;
use tracing::{debug, instrument};

use crate::config::PostgresConfig;
use crate::error::query_error;
use crate::migrations;
use crate::pool;
use crate::queries::{analyses, executions, patterns, recommendations};

/// PostgreSQL storage backend for profiler data.
#[derive(Debug, Clone)]
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    /// Creates a new `PostgresStorage` with the given configuration.
    ///
    /// This will:
    /// 1. Create a connection pool
    /// 2. Run migrations (if configured)
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created
    /// or if migrations fail.
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::create_pool(&config).await?;

        if config.run_migrations {
            migrations::run(&pool).await?;
        }

        Ok(Self { pool })
    }

    /// Creates a new `PostgresStorage` from an existing connection pool.
    ///
    /// Migrations are not run automatically when using this constructor.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Deletes a pattern together with everything recorded about it.
    ///
    /// Returns `true` if the pattern existed.
    pub async fn delete_pattern(&self, id: PatternId) -> Result<bool, StorageError> {
        patterns::delete(&self.pool, id).await
    }
}

#[async_trait]
impl ProfilerStorage for PostgresStorage {
    #[instrument(skip_all, fields(duration_ms = execution.duration_ms))]
    async fn record_execution(&self, execution: &NewExecution) -> Result<PatternId, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::transaction_error(format!("Failed to begin: {e}")))?;

        let pattern_id = patterns::upsert(
            &mut tx,
            &execution.normalized_sql,
            &execution.raw_sql,
            execution.executed_at,
        )
        .await?;
        executions::insert(&mut tx, pattern_id, execution).await?;

        tx.commit()
            .await
            .map_err(|e| StorageError::transaction_error(format!("Failed to commit: {e}")))?;

        debug!(pattern_id, "Recorded execution");
        Ok(pattern_id)
    }

    async fn get_pattern(&self, id: PatternId) -> Result<Option<QueryPattern>, StorageError> {
        patterns::get(&self.pool, id).await
    }

    async fn recent_patterns(&self, limit: usize) -> Result<Vec<QueryPattern>, StorageError> {
        patterns::recent(&self.pool, limit).await
    }

    #[instrument(skip(self))]
    async fn slow_query_candidates(
        &self,
        thresholds: &CandidateThresholds,
    ) -> Result<Vec<SlowQueryCandidate>, StorageError> {
        patterns::slow_query_candidates(&self.pool, thresholds).await
    }

    async fn insert_analysis(
        &self,
        analysis: &NewPlanAnalysis,
    ) -> Result<PlanAnalysis, StorageError> {
        analyses::insert(&self.pool, analysis).await
    }

    async fn get_analysis(&self, id: i64) -> Result<Option<PlanAnalysis>, StorageError> {
        analyses::get(&self.pool, id).await
    }

    async fn latest_analyses(&self, limit: usize) -> Result<Vec<PlanAnalysis>, StorageError> {
        analyses::latest(&self.pool, limit).await
    }

    async fn insert_recommendation(
        &self,
        recommendation: &NewRecommendation,
    ) -> Result<Recommendation, StorageError> {
        recommendations::insert(&self.pool, recommendation).await
    }

    async fn executions_for_patterns(
        &self,
        pattern_ids: &[PatternId],
    ) -> Result<Vec<ExecutionRecord>, StorageError> {
        executions::for_patterns(&self.pool, pattern_ids).await
    }

    async fn analyses_for_patterns(
        &self,
        pattern_ids: &[PatternId],
    ) -> Result<Vec<PlanAnalysis>, StorageError> {
        analyses::for_patterns(&self.pool, pattern_ids).await
    }

    async fn recommendations_for_patterns(
        &self,
        pattern_ids: &[PatternId],
    ) -> Result<Vec<Recommendation>, StorageError> {
        recommendations::for_patterns(&self.pool, pattern_ids).await
    }
}

/// Checks that the profiler tables exist.
///
/// # Errors
///
/// Returns an error if the schema has not been migrated.
pub async fn verify_schema(pool: &PgPool) -> Result<(), StorageError> {
    sqlx_core::query::query("SELECT 1 FROM query_patterns LIMIT 1")
        .execute(pool)
        .await
        .map_err(|e| query_error("Profiler schema check failed", e))?;
    Ok(())
}
