//! Recommendation generation.
//!
//! [`RecommendationEngine::generate`] walks one stored analysis through a
//! fixed sequence: load the analysis and its pattern, ask the reasoning
//! service, validate the reply, apply the confidence guardrails, store.
//! Every exit is a [`RecommendationOutcome`]; only `Persisted` writes a row.

pub mod prompt;
pub mod response;

use std::time::Duration;

use chrono::Utc;
use querylens_core::{ConfidencePolicy, PlanAnalysis, Recommendation, Severity};
use querylens_reasoning::DynReasoningClient;
use querylens_storage::{DynStorage, NewRecommendation, StorageError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

pub use response::{RecommendationDraft, ResponseError, parse_response};

use crate::recorder::without_recording;

/// Default upper bound on one reasoning call.
const DEFAULT_REASONING_TIMEOUT_MS: u64 = 60_000;

/// Guardrails and limits for recommendation generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub confidence: ConfidencePolicy,
    /// Upper bound on one reasoning call, in milliseconds.
    pub reasoning_timeout_ms: u64,
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            confidence: ConfidencePolicy::default(),
            reasoning_timeout_ms: DEFAULT_REASONING_TIMEOUT_MS,
        }
    }
}

impl RecommendationConfig {
    /// # Errors
    ///
    /// Returns a description of the first invalid setting.
    pub fn validate(&self) -> Result<(), String> {
        self.confidence.validate()?;
        if self.reasoning_timeout_ms == 0 {
            return Err("reasoning_timeout_ms must be greater than 0".into());
        }
        Ok(())
    }
}

/// How a generation attempt ended.
#[derive(Debug)]
pub enum RecommendationOutcome {
    /// A recommendation was validated and stored.
    Persisted(Recommendation),
    AnalysisNotFound,
    PatternNotFound,
    /// The reasoning service failed or timed out.
    ReasoningFailed(String),
    /// The reply did not pass validation.
    Rejected(ResponseError),
    StorageFailed(StorageError),
}

impl RecommendationOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted(_))
    }

    pub fn recommendation(&self) -> Option<&Recommendation> {
        match self {
            Self::Persisted(r) => Some(r),
            _ => None,
        }
    }

    /// Short machine-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Persisted(_) => "persisted",
            Self::AnalysisNotFound => "analysis_not_found",
            Self::PatternNotFound => "pattern_not_found",
            Self::ReasoningFailed(_) => "reasoning_failed",
            Self::Rejected(_) => "rejected",
            Self::StorageFailed(_) => "storage_failed",
        }
    }
}

impl std::fmt::Display for RecommendationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Persisted(r) => write!(f, "persisted recommendation {}", r.id),
            Self::AnalysisNotFound => f.write_str("analysis not found"),
            Self::PatternNotFound => f.write_str("pattern not found"),
            Self::ReasoningFailed(reason) => write!(f, "reasoning failed: {reason}"),
            Self::Rejected(e) => write!(f, "reply rejected: {e}"),
            Self::StorageFailed(e) => write!(f, "storage failed: {e}"),
        }
    }
}

/// Turns stored plan analyses into vetted recommendations.
pub struct RecommendationEngine {
    storage: DynStorage,
    reasoner: DynReasoningClient,
    config: RecommendationConfig,
}

impl RecommendationEngine {
    pub fn new(
        storage: DynStorage,
        reasoner: DynReasoningClient,
        config: RecommendationConfig,
    ) -> Self {
        Self {
            storage,
            reasoner,
            config,
        }
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    /// Generates and stores at most one recommendation for an analysis.
    ///
    /// Never fails: every problem is reported through the outcome and
    /// logged. The reasoning call runs with no storage transaction open.
    #[instrument(skip(self))]
    pub async fn generate(&self, analysis_id: i64) -> RecommendationOutcome {
        let analysis = match without_recording(self.storage.get_analysis(analysis_id)).await {
            Ok(Some(analysis)) => analysis,
            Ok(None) => {
                debug!("Analysis not found");
                return RecommendationOutcome::AnalysisNotFound;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load analysis");
                return RecommendationOutcome::StorageFailed(e);
            }
        };
        self.generate_for(&analysis).await
    }

    /// Runs [`generate`](Self::generate) for the newest analyses, one at a time.
    ///
    /// # Errors
    ///
    /// Returns an error only if the analyses could not be listed.
    #[instrument(skip(self))]
    pub async fn generate_latest(
        &self,
        limit: usize,
    ) -> Result<Vec<(i64, RecommendationOutcome)>, StorageError> {
        let analyses = without_recording(self.storage.latest_analyses(limit)).await?;
        let mut outcomes = Vec::with_capacity(analyses.len());
        for analysis in &analyses {
            outcomes.push((analysis.id, self.generate_for(analysis).await));
        }

        let persisted = outcomes.iter().filter(|(_, o)| o.is_persisted()).count();
        info!(attempted = outcomes.len(), persisted, "Recommendation batch finished");
        Ok(outcomes)
    }

    async fn generate_for(&self, analysis: &PlanAnalysis) -> RecommendationOutcome {
        let pattern = match without_recording(self.storage.get_pattern(analysis.pattern_id)).await
        {
            Ok(Some(pattern)) => pattern,
            Ok(None) => {
                debug!(pattern_id = analysis.pattern_id, "Pattern not found");
                return RecommendationOutcome::PatternNotFound;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load pattern");
                return RecommendationOutcome::StorageFailed(e);
            }
        };

        let messages = prompt::build_messages(
            &pattern.raw_example_sql,
            &analysis.plan,
            analysis.seq_scan_detected,
            analysis.execution_time_ms,
        );

        let timeout = Duration::from_millis(self.config.reasoning_timeout_ms);
        let raw = match tokio::time::timeout(timeout, self.reasoner.complete(&messages)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!(analysis_id = analysis.id, error = %e, "Reasoning call failed");
                return RecommendationOutcome::ReasoningFailed(e.to_string());
            }
            Err(_) => {
                warn!(
                    analysis_id = analysis.id,
                    timeout_ms = self.config.reasoning_timeout_ms,
                    "Reasoning call timed out"
                );
                return RecommendationOutcome::ReasoningFailed(format!(
                    "timed out after {} ms",
                    self.config.reasoning_timeout_ms
                ));
            }
        };

        let draft = match parse_response(&raw) {
            Ok(draft) => draft,
            Err(e) => {
                warn!(analysis_id = analysis.id, error = %e, response = %raw, "Rejected reasoning reply");
                return RecommendationOutcome::Rejected(e);
            }
        };

        let confidence_score = self.config.confidence.apply(
            draft.confidence_score,
            analysis.seq_scan_detected,
            analysis.execution_time_ms,
        );
        let new_recommendation = NewRecommendation {
            pattern_id: pattern.id,
            generated_at: Utc::now(),
            severity: Severity::from_seq_scan(analysis.seq_scan_detected),
            summary: draft.summary,
            details: draft.details,
            confidence_score,
        };

        match without_recording(self.storage.insert_recommendation(&new_recommendation)).await {
            Ok(recommendation) => {
                info!(
                    recommendation_id = recommendation.id,
                    pattern_id = recommendation.pattern_id,
                    severity = %recommendation.severity,
                    confidence = recommendation.confidence_score,
                    raw_confidence = draft.confidence_score,
                    "Stored recommendation"
                );
                RecommendationOutcome::Persisted(recommendation)
            }
            Err(e) => {
                warn!(error = %e, "Failed to store recommendation");
                RecommendationOutcome::StorageFailed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use querylens_db_memory::InMemoryStorage;
    use querylens_storage::{NewPlanAnalysis, ProfilerStorage};
    use serde_json::json;

    use super::*;
    use crate::test_support::{
        HookedStorage, Script, ScriptedReasoner, index_plan, seed_executions, seq_scan_plan,
        valid_reply,
    };

    const SQL: &str = "SELECT * FROM orders WHERE customer_id = 42";

    async fn stored_analysis(storage: &dyn ProfilerStorage, plan: serde_json::Value) -> PlanAnalysis {
        let pattern_id = seed_executions(storage, SQL, 1, 10.0).await;
        let plan = querylens_core::ExplainPlan::from_json(&plan).unwrap();
        storage
            .insert_analysis(&NewPlanAnalysis::from_plan(pattern_id, plan, Utc::now()))
            .await
            .unwrap()
    }

    fn engine(storage: DynStorage, reasoner: Arc<ScriptedReasoner>) -> RecommendationEngine {
        RecommendationEngine::new(storage, reasoner, RecommendationConfig::default())
    }

    #[tokio::test]
    async fn test_weak_evidence_discounts_confidence() {
        let storage = Arc::new(InMemoryStorage::new());
        let analysis = stored_analysis(storage.as_ref(), index_plan(50.0)).await;
        let reasoner = Arc::new(ScriptedReasoner::reply(valid_reply(0.99)));

        let outcome = engine(storage.clone(), reasoner.clone()).generate(analysis.id).await;

        let recommendation = outcome.recommendation().unwrap();
        assert_eq!(recommendation.confidence_score, 0.63);
        assert_eq!(recommendation.severity, Severity::Medium);
        assert_eq!(recommendation.pattern_id, analysis.pattern_id);
        assert_eq!(storage.recommendation_count().await, 1);
        assert_eq!(reasoner.calls(), 1);
    }

    #[tokio::test]
    async fn test_seq_scan_is_high_severity_and_capped() {
        let storage = Arc::new(InMemoryStorage::new());
        let analysis = stored_analysis(storage.as_ref(), seq_scan_plan(2450.0)).await;
        let reasoner = Arc::new(ScriptedReasoner::reply(valid_reply(1.0)));

        let outcome = engine(storage.clone(), reasoner.clone()).generate(analysis.id).await;

        let recommendation = outcome.recommendation().unwrap();
        assert_eq!(recommendation.severity, Severity::High);
        assert_eq!(recommendation.confidence_score, 0.95);

        let prompt = reasoner.last_prompt().unwrap();
        assert!(prompt[1].content.contains(SQL));
        assert!(prompt[1].content.contains("Sequential scan detected: true"));
    }

    #[tokio::test]
    async fn test_missing_confidence_persists_nothing() {
        let storage = Arc::new(InMemoryStorage::new());
        let analysis = stored_analysis(storage.as_ref(), seq_scan_plan(900.0)).await;
        let reasoner = Arc::new(ScriptedReasoner::reply(json!({
            "summary": "Add an index on orders.customer_id.",
            "details": "1. Slow. 2. Seq Scan. 3. Add an index. 4. Slower writes."
        })));

        let outcome = engine(storage.clone(), reasoner).generate(analysis.id).await;

        assert!(matches!(
            outcome,
            RecommendationOutcome::Rejected(ResponseError::MissingField("confidence_score"))
        ));
        assert_eq!(storage.recommendation_count().await, 0);
    }

    #[tokio::test]
    async fn test_reasoning_failure_persists_nothing() {
        let storage = Arc::new(InMemoryStorage::new());
        let analysis = stored_analysis(storage.as_ref(), seq_scan_plan(900.0)).await;
        let reasoner = Arc::new(ScriptedReasoner::new(Script::Fail));

        let outcome = engine(storage.clone(), reasoner).generate(analysis.id).await;

        assert_eq!(outcome.label(), "reasoning_failed");
        assert_eq!(storage.recommendation_count().await, 0);
    }

    #[tokio::test]
    async fn test_reasoning_timeout_persists_nothing() {
        let storage = Arc::new(InMemoryStorage::new());
        let analysis = stored_analysis(storage.as_ref(), seq_scan_plan(900.0)).await;
        let reasoner = Arc::new(ScriptedReasoner::new(Script::Hang));
        let engine = RecommendationEngine::new(
            storage.clone(),
            reasoner,
            RecommendationConfig {
                reasoning_timeout_ms: 250,
                ..Default::default()
            },
        );

        let outcome = engine.generate(analysis.id).await;

        assert!(matches!(outcome, RecommendationOutcome::ReasoningFailed(ref m) if m.contains("250")));
        assert_eq!(storage.recommendation_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_analysis_skips_reasoning() {
        let storage = Arc::new(InMemoryStorage::new());
        let reasoner = Arc::new(ScriptedReasoner::reply(valid_reply(0.5)));

        let outcome = engine(storage, reasoner.clone()).generate(404).await;

        assert!(matches!(outcome, RecommendationOutcome::AnalysisNotFound));
        assert_eq!(reasoner.calls(), 0);
    }

    #[tokio::test]
    async fn test_deleted_pattern_is_reported() {
        let storage = Arc::new(InMemoryStorage::new());
        let analysis = stored_analysis(storage.as_ref(), seq_scan_plan(900.0)).await;
        let reasoner = Arc::new(ScriptedReasoner::reply(valid_reply(0.5)));
        let engine = engine(storage.clone(), reasoner.clone());

        // Keep a copy of the analysis, then drop its pattern.
        storage.delete_pattern(analysis.pattern_id).await;
        let outcome = engine.generate_for(&analysis).await;

        assert!(matches!(outcome, RecommendationOutcome::PatternNotFound));
        assert_eq!(reasoner.calls(), 0);
    }

    #[tokio::test]
    async fn test_storage_failure_on_insert_is_reported() {
        let storage = Arc::new(HookedStorage::failing());
        let pattern_id = seed_executions(storage.inner(), SQL, 1, 10.0).await;
        let plan = querylens_core::ExplainPlan::from_json(&seq_scan_plan(900.0)).unwrap();
        let analysis = storage
            .insert_analysis(&NewPlanAnalysis::from_plan(pattern_id, plan, Utc::now()))
            .await
            .unwrap();

        let outcome = engine(storage.clone(), Arc::new(ScriptedReasoner::reply(valid_reply(0.8))))
            .generate(analysis.id)
            .await;

        assert!(matches!(outcome, RecommendationOutcome::StorageFailed(_)));
        assert_eq!(storage.inner().recommendation_count().await, 0);
    }

    #[tokio::test]
    async fn test_generate_latest_isolates_attempts() {
        let storage = Arc::new(InMemoryStorage::new());
        let first = stored_analysis(storage.as_ref(), seq_scan_plan(900.0)).await;
        let second = stored_analysis(storage.as_ref(), index_plan(40.0)).await;
        let reasoner = Arc::new(ScriptedReasoner::reply(valid_reply(0.7)));

        let outcomes = engine(storage.clone(), reasoner.clone())
            .generate_latest(10)
            .await
            .unwrap();

        let ids: Vec<i64> = outcomes.iter().map(|(id, _)| *id).collect();
        assert!(ids.contains(&first.id) && ids.contains(&second.id));
        assert!(outcomes.iter().all(|(_, o)| o.is_persisted()));
        assert_eq!(reasoner.calls(), 2);
        assert_eq!(storage.recommendation_count().await, 2);
    }

    #[test]
    fn test_config_validation() {
        assert!(RecommendationConfig::default().validate().is_ok());
        let config = RecommendationConfig {
            reasoning_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
