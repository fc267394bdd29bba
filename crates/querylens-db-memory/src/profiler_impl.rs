//! `ProfilerStorage` implementation for [`InMemoryStorage`].

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use querylens_core::{ExecutionRecord, PatternId, PlanAnalysis, QueryPattern, Recommendation};
use querylens_storage::{
    CandidateThresholds, NewExecution, NewPlanAnalysis, NewRecommendation, ProfilerStorage,
    SlowQueryCandidate, StorageError, rank_candidates,
};

use crate::storage::InMemoryStorage;

#[async_trait]
impl ProfilerStorage for InMemoryStorage {
    async fn record_execution(&self, execution: &NewExecution) -> Result<PatternId, StorageError> {
        let mut tables = self.tables.write().await;

        let pattern_id = match tables.pattern_by_sql(&execution.normalized_sql) {
            Some(pattern) => {
                pattern.total_executions += 1;
                pattern.last_seen_at = pattern.last_seen_at.max(execution.executed_at);
                pattern.raw_example_sql.clone_from(&execution.raw_sql);
                pattern.id
            }
            None => {
                let id = tables.next_id();
                tables.insert_pattern(QueryPattern {
                    id,
                    normalized_sql: execution.normalized_sql.clone(),
                    raw_example_sql: execution.raw_sql.clone(),
                    total_executions: 1,
                    first_seen_at: execution.executed_at,
                    last_seen_at: execution.executed_at,
                });
                id
            }
        };

        let id = tables.next_id();
        tables.executions.push(ExecutionRecord {
            id,
            pattern_id,
            executed_at: execution.executed_at,
            duration_ms: execution.duration_ms,
            rows_returned: execution.rows_returned,
            rows_affected: execution.rows_affected,
            error: execution.error.clone(),
        });

        Ok(pattern_id)
    }

    async fn get_pattern(&self, id: PatternId) -> Result<Option<QueryPattern>, StorageError> {
        Ok(self.tables.read().await.patterns.get(&id).cloned())
    }

    async fn recent_patterns(&self, limit: usize) -> Result<Vec<QueryPattern>, StorageError> {
        let tables = self.tables.read().await;
        let mut patterns: Vec<QueryPattern> = tables.patterns.values().cloned().collect();
        patterns.sort_by(|a, b| {
            b.last_seen_at
                .cmp(&a.last_seen_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        patterns.truncate(limit);
        Ok(patterns)
    }

    async fn slow_query_candidates(
        &self,
        thresholds: &CandidateThresholds,
    ) -> Result<Vec<SlowQueryCandidate>, StorageError> {
        let tables = self.tables.read().await;

        let mut totals: HashMap<PatternId, (f64, i64)> = HashMap::new();
        for execution in &tables.executions {
            let entry = totals.entry(execution.pattern_id).or_insert((0.0, 0));
            entry.0 += execution.duration_ms;
            entry.1 += 1;
        }

        let aggregated = totals.into_iter().filter_map(|(pattern_id, (sum, count))| {
            tables
                .patterns
                .get(&pattern_id)
                .map(|pattern| SlowQueryCandidate {
                    pattern: pattern.clone(),
                    avg_duration_ms: sum / count as f64,
                    execution_count: count,
                })
        });

        Ok(rank_candidates(aggregated, thresholds))
    }

    async fn insert_analysis(
        &self,
        analysis: &NewPlanAnalysis,
    ) -> Result<PlanAnalysis, StorageError> {
        let mut tables = self.tables.write().await;
        if !tables.patterns.contains_key(&analysis.pattern_id) {
            return Err(StorageError::not_found("QueryPattern", analysis.pattern_id));
        }

        let stored = analysis.clone().into_analysis(tables.next_id());
        tables.analyses.push(stored.clone());
        Ok(stored)
    }

    async fn get_analysis(&self, id: i64) -> Result<Option<PlanAnalysis>, StorageError> {
        let tables = self.tables.read().await;
        Ok(tables.analyses.iter().find(|a| a.id == id).cloned())
    }

    async fn latest_analyses(&self, limit: usize) -> Result<Vec<PlanAnalysis>, StorageError> {
        let tables = self.tables.read().await;
        let mut analyses = tables.analyses.clone();
        analyses.sort_by(|a, b| b.executed_at.cmp(&a.executed_at).then_with(|| b.id.cmp(&a.id)));
        analyses.truncate(limit);
        Ok(analyses)
    }

    async fn insert_recommendation(
        &self,
        recommendation: &NewRecommendation,
    ) -> Result<Recommendation, StorageError> {
        let mut tables = self.tables.write().await;
        if !tables.patterns.contains_key(&recommendation.pattern_id) {
            return Err(StorageError::not_found(
                "QueryPattern",
                recommendation.pattern_id,
            ));
        }

        let stored = recommendation.clone().into_recommendation(tables.next_id());
        tables.recommendations.push(stored.clone());
        Ok(stored)
    }

    async fn executions_for_patterns(
        &self,
        pattern_ids: &[PatternId],
    ) -> Result<Vec<ExecutionRecord>, StorageError> {
        let wanted: HashSet<PatternId> = pattern_ids.iter().copied().collect();
        let tables = self.tables.read().await;
        let mut rows: Vec<ExecutionRecord> = tables
            .executions
            .iter()
            .filter(|e| wanted.contains(&e.pattern_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.executed_at.cmp(&a.executed_at).then_with(|| b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn analyses_for_patterns(
        &self,
        pattern_ids: &[PatternId],
    ) -> Result<Vec<PlanAnalysis>, StorageError> {
        let wanted: HashSet<PatternId> = pattern_ids.iter().copied().collect();
        let tables = self.tables.read().await;
        let mut rows: Vec<PlanAnalysis> = tables
            .analyses
            .iter()
            .filter(|a| wanted.contains(&a.pattern_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.executed_at.cmp(&a.executed_at).then_with(|| b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn recommendations_for_patterns(
        &self,
        pattern_ids: &[PatternId],
    ) -> Result<Vec<Recommendation>, StorageError> {
        let wanted: HashSet<PatternId> = pattern_ids.iter().copied().collect();
        let tables = self.tables.read().await;
        let mut rows: Vec<Recommendation> = tables
            .recommendations
            .iter()
            .filter(|r| wanted.contains(&r.pattern_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            b.generated_at
                .cmp(&a.generated_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }
}
