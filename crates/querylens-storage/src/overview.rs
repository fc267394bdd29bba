//! Read surface over stored patterns.
//!
//! Related entities are fetched in one batch per entity kind, keyed by the
//! whole pattern-id set, so listing N patterns costs four round trips rather
//! than `1 + 3N`.

use std::collections::HashMap;

use querylens_core::PatternId;
use tracing::debug;

use crate::error::StorageError;
use crate::traits::ProfilerStorage;
use crate::types::PatternOverview;

/// Loads the most recently seen patterns with their history attached.
pub async fn load_pattern_overviews(
    storage: &dyn ProfilerStorage,
    limit: usize,
) -> Result<Vec<PatternOverview>, StorageError> {
    let patterns = storage.recent_patterns(limit).await?;
    if patterns.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<PatternId> = patterns.iter().map(|p| p.id).collect();
    let mut executions = group_by_pattern(
        storage.executions_for_patterns(&ids).await?,
        |e| e.pattern_id,
    );
    let mut analyses = group_by_pattern(storage.analyses_for_patterns(&ids).await?, |a| {
        a.pattern_id
    });
    let mut recommendations = group_by_pattern(
        storage.recommendations_for_patterns(&ids).await?,
        |r| r.pattern_id,
    );

    debug!(patterns = ids.len(), "Loaded pattern overviews");

    Ok(patterns
        .into_iter()
        .map(|pattern| PatternOverview {
            executions: executions.remove(&pattern.id).unwrap_or_default(),
            analyses: analyses.remove(&pattern.id).unwrap_or_default(),
            recommendations: recommendations.remove(&pattern.id).unwrap_or_default(),
            pattern,
        })
        .collect())
}

/// Groups rows by owning pattern, preserving the backend's order.
fn group_by_pattern<T>(
    rows: Vec<T>,
    key: impl Fn(&T) -> PatternId,
) -> HashMap<PatternId, Vec<T>> {
    let mut grouped: HashMap<PatternId, Vec<T>> = HashMap::new();
    for row in rows {
        grouped.entry(key(&row)).or_default().push(row);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use querylens_core::{ExecutionRecord, PlanAnalysis, QueryPattern, Recommendation};

    use super::*;
    use crate::types::{
        CandidateThresholds, NewExecution, NewPlanAnalysis, NewRecommendation, SlowQueryCandidate,
    };

    /// Serves canned rows and counts every call.
    struct CannedStorage {
        patterns: Vec<QueryPattern>,
        executions: Vec<ExecutionRecord>,
        calls: AtomicUsize,
    }

    impl CannedStorage {
        fn new(pattern_count: i64) -> Self {
            let now = Utc::now();
            let patterns = (1..=pattern_count)
                .map(|id| QueryPattern {
                    id,
                    normalized_sql: format!("SELECT {id} WHERE id = ?"),
                    raw_example_sql: format!("SELECT {id} WHERE id = 1"),
                    total_executions: 2,
                    first_seen_at: now,
                    last_seen_at: now,
                })
                .collect::<Vec<_>>();
            let executions = patterns
                .iter()
                .flat_map(|p| {
                    (0..2).map(move |n| ExecutionRecord {
                        id: p.id * 10 + n,
                        pattern_id: p.id,
                        executed_at: now - Duration::seconds(n),
                        duration_ms: 1.0,
                        rows_returned: Some(1),
                        rows_affected: None,
                        error: None,
                    })
                })
                .collect();
            Self {
                patterns,
                executions,
                calls: AtomicUsize::new(0),
            }
        }

        fn tick(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ProfilerStorage for CannedStorage {
        async fn record_execution(&self, _: &NewExecution) -> Result<PatternId, StorageError> {
            Err(StorageError::internal("read-only"))
        }

        async fn get_pattern(&self, _: PatternId) -> Result<Option<QueryPattern>, StorageError> {
            self.tick();
            Ok(None)
        }

        async fn recent_patterns(&self, limit: usize) -> Result<Vec<QueryPattern>, StorageError> {
            self.tick();
            Ok(self.patterns.iter().take(limit).cloned().collect())
        }

        async fn slow_query_candidates(
            &self,
            _: &CandidateThresholds,
        ) -> Result<Vec<SlowQueryCandidate>, StorageError> {
            self.tick();
            Ok(Vec::new())
        }

        async fn insert_analysis(&self, _: &NewPlanAnalysis) -> Result<PlanAnalysis, StorageError> {
            Err(StorageError::internal("read-only"))
        }

        async fn get_analysis(&self, _: i64) -> Result<Option<PlanAnalysis>, StorageError> {
            self.tick();
            Ok(None)
        }

        async fn latest_analyses(&self, _: usize) -> Result<Vec<PlanAnalysis>, StorageError> {
            self.tick();
            Ok(Vec::new())
        }

        async fn insert_recommendation(
            &self,
            _: &NewRecommendation,
        ) -> Result<Recommendation, StorageError> {
            Err(StorageError::internal("read-only"))
        }

        async fn executions_for_patterns(
            &self,
            ids: &[PatternId],
        ) -> Result<Vec<ExecutionRecord>, StorageError> {
            self.tick();
            Ok(self
                .executions
                .iter()
                .filter(|e| ids.contains(&e.pattern_id))
                .cloned()
                .collect())
        }

        async fn analyses_for_patterns(
            &self,
            _: &[PatternId],
        ) -> Result<Vec<PlanAnalysis>, StorageError> {
            self.tick();
            Ok(Vec::new())
        }

        async fn recommendations_for_patterns(
            &self,
            _: &[PatternId],
        ) -> Result<Vec<Recommendation>, StorageError> {
            self.tick();
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_four_round_trips_regardless_of_pattern_count() {
        let storage = CannedStorage::new(25);
        let overviews = load_pattern_overviews(&storage, 20).await.unwrap();

        assert_eq!(overviews.len(), 20);
        assert_eq!(storage.calls.load(Ordering::SeqCst), 4);
        assert!(overviews.iter().all(|o| o.executions.len() == 2));
        assert!(overviews.iter().all(|o| o.recommendations.is_empty()));
    }

    #[tokio::test]
    async fn test_executions_are_attached_to_their_pattern() {
        let storage = CannedStorage::new(3);
        let overviews = load_pattern_overviews(&storage, 10).await.unwrap();

        for overview in &overviews {
            assert!(overview
                .executions
                .iter()
                .all(|e| e.pattern_id == overview.pattern.id));
            assert!(overview.executions[0].executed_at >= overview.executions[1].executed_at);
        }
    }

    #[tokio::test]
    async fn test_no_patterns_means_one_round_trip() {
        let storage = CannedStorage::new(0);
        let overviews = load_pattern_overviews(&storage, 10).await.unwrap();

        assert!(overviews.is_empty());
        assert_eq!(storage.calls.load(Ordering::SeqCst), 1);
    }
}
