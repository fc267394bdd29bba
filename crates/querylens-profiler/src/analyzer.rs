//! Execution-plan capture and analysis.
//!
//! The analyzer runs a pattern's representative statement under plan
//! instrumentation, parses the plan tree, derives the scan flags and stores
//! the result as a [`PlanAnalysis`].

use chrono::Utc;
use querylens_core::{CoreError, ExplainPlan, PatternId, PlanAnalysis};
use querylens_storage::{DynPlanCapture, DynStorage, NewPlanAnalysis, StorageError};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::recorder::without_recording;

/// Errors that can occur during plan analysis.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("Failed to capture plan: {0}")]
    CaptureFailed(#[source] StorageError),

    #[error("Failed to parse query plan: {0}")]
    ParseFailed(#[from] CoreError),

    #[error("Failed to store analysis: {0}")]
    PersistFailed(#[source] StorageError),
}

/// Captures, inspects and stores execution plans.
pub struct PlanAnalyzer {
    storage: DynStorage,
    capture: DynPlanCapture,
}

impl PlanAnalyzer {
    pub fn new(storage: DynStorage, capture: DynPlanCapture) -> Self {
        Self { storage, capture }
    }

    /// Analyzes one pattern using `sql` as its representative statement.
    ///
    /// The statement really executes, under the plan capture's rollback,
    /// and is not recorded as an execution. Nothing is stored unless the plan
    /// was captured and parsed.
    ///
    /// # Errors
    ///
    /// - [`AnalyzerError::CaptureFailed`] if the statement could not be explained
    /// - [`AnalyzerError::ParseFailed`] if the plan document is not a plan
    /// - [`AnalyzerError::PersistFailed`] if the analysis could not be stored
    #[instrument(skip(self, sql))]
    pub async fn analyze(
        &self,
        pattern_id: PatternId,
        sql: &str,
    ) -> Result<PlanAnalysis, AnalyzerError> {
        let raw = without_recording(self.capture.capture_plan(sql))
            .await
            .map_err(AnalyzerError::CaptureFailed)?;

        let plan = ExplainPlan::from_json(&raw)?;
        let new_analysis = NewPlanAnalysis::from_plan(pattern_id, plan, Utc::now());

        if new_analysis.seq_scan_detected {
            warn!(
                pattern_id,
                relations = ?new_analysis.plan.plan.seq_scan_relations(),
                execution_time_ms = ?new_analysis.execution_time_ms(),
                "Sequential scan detected"
            );
        } else {
            debug!(pattern_id, nodes = new_analysis.plan.plan.node_count(), "No sequential scan");
        }

        let analysis = without_recording(self.storage.insert_analysis(&new_analysis))
            .await
            .map_err(AnalyzerError::PersistFailed)?;

        info!(
            analysis_id = analysis.id,
            pattern_id,
            seq_scan = analysis.seq_scan_detected,
            index_scan = analysis.index_scan_detected,
            "Stored plan analysis"
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use querylens_db_memory::InMemoryStorage;
    use querylens_storage::ProfilerStorage;
    use serde_json::json;

    use super::*;
    use crate::test_support::{StaticPlanCapture, index_plan, seed_executions, seq_scan_plan};

    const SQL: &str = "SELECT * FROM orders WHERE customer_id = 42";

    #[tokio::test]
    async fn test_deep_seq_scan_is_flagged_and_stored() {
        let storage = Arc::new(InMemoryStorage::new());
        let pattern_id = seed_executions(storage.as_ref(), SQL, 1, 10.0).await;
        let capture = Arc::new(StaticPlanCapture::new(seq_scan_plan(812.5)));
        let analyzer = PlanAnalyzer::new(storage.clone(), capture.clone());

        let analysis = analyzer.analyze(pattern_id, SQL).await.unwrap();

        assert!(analysis.seq_scan_detected);
        assert!(!analysis.index_scan_detected);
        assert_eq!(analysis.execution_time_ms, Some(812.5));
        assert_eq!(analysis.planning_time_ms, Some(0.4));
        assert!(capture.saw_guard());

        let stored = storage.get_analysis(analysis.id).await.unwrap().unwrap();
        assert_eq!(stored, analysis);
    }

    #[tokio::test]
    async fn test_stored_plan_rescans_to_same_flags() {
        let storage = Arc::new(InMemoryStorage::new());
        let pattern_id = seed_executions(storage.as_ref(), SQL, 1, 10.0).await;
        let analyzer = PlanAnalyzer::new(
            storage.clone(),
            Arc::new(StaticPlanCapture::new(index_plan(3.0))),
        );

        let analysis = analyzer.analyze(pattern_id, SQL).await.unwrap();
        let reparsed = ExplainPlan::from_json(&analysis.plan.to_json()).unwrap();
        let signals = reparsed.scan_signals();

        assert_eq!(signals.seq_scan, analysis.seq_scan_detected);
        assert_eq!(signals.index_scan, analysis.index_scan_detected);
        assert!(signals.index_scan);
        assert_eq!(reparsed.plan.index_name.as_deref(), Some("orders_pkey"));
    }

    #[tokio::test]
    async fn test_capture_failure_stores_nothing() {
        let storage = Arc::new(InMemoryStorage::new());
        let pattern_id = seed_executions(storage.as_ref(), SQL, 1, 10.0).await;
        let analyzer = PlanAnalyzer::new(
            storage.clone(),
            Arc::new(StaticPlanCapture::failing("syntax error at or near \"FORM\"")),
        );

        let err = analyzer.analyze(pattern_id, SQL).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::CaptureFailed(_)));
        assert!(storage.latest_analyses(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_plan_stores_nothing() {
        let storage = Arc::new(InMemoryStorage::new());
        let pattern_id = seed_executions(storage.as_ref(), SQL, 1, 10.0).await;
        let analyzer = PlanAnalyzer::new(
            storage.clone(),
            Arc::new(StaticPlanCapture::new(json!([{ "Planning Time": 0.2 }]))),
        );

        let err = analyzer.analyze(pattern_id, SQL).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::ParseFailed(_)));
        assert!(storage.latest_analyses(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_pattern_fails_to_persist() {
        let analyzer = PlanAnalyzer::new(
            Arc::new(InMemoryStorage::new()),
            Arc::new(StaticPlanCapture::new(index_plan(1.0))),
        );

        let err = analyzer.analyze(999, SQL).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::PersistFailed(e) if e.is_not_found()));
    }
}
