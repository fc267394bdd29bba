//! Input and output types shared by storage backends.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use querylens_core::{
    ExecutionRecord, ExplainPlan, PatternId, PlanAnalysis, QueryPattern, Recommendation, Severity,
    StatementOutcome,
};
use serde::{Deserialize, Serialize};

/// One observed statement execution, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExecution {
    /// Pattern key the execution aggregates under.
    pub normalized_sql: String,
    /// Literal statement text, kept as the pattern's example.
    pub raw_sql: String,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: f64,
    pub rows_returned: Option<i64>,
    pub rows_affected: Option<i64>,
    pub error: Option<String>,
}

impl NewExecution {
    /// Builds an execution from a driver outcome.
    #[must_use]
    pub fn from_outcome(
        normalized_sql: impl Into<String>,
        raw_sql: impl Into<String>,
        executed_at: DateTime<Utc>,
        duration_ms: f64,
        outcome: &StatementOutcome,
    ) -> Self {
        let (rows_returned, rows_affected, error) = match outcome {
            StatementOutcome::Rows(n) => (Some(saturating_i64(*n)), None, None),
            StatementOutcome::Affected(n) => (None, Some(saturating_i64(*n)), None),
            StatementOutcome::Failed(message) => (None, None, Some(message.clone())),
        };

        Self {
            normalized_sql: normalized_sql.into(),
            raw_sql: raw_sql.into(),
            executed_at,
            duration_ms: duration_ms.max(0.0),
            rows_returned,
            rows_affected,
            error,
        }
    }
}

fn saturating_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// A captured plan, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPlanAnalysis {
    pub pattern_id: PatternId,
    pub executed_at: DateTime<Utc>,
    pub plan: ExplainPlan,
    pub seq_scan_detected: bool,
    pub index_scan_detected: bool,
}

impl NewPlanAnalysis {
    /// Derives the scan flags from the plan tree.
    #[must_use]
    pub fn from_plan(pattern_id: PatternId, plan: ExplainPlan, executed_at: DateTime<Utc>) -> Self {
        let signals = plan.scan_signals();
        Self {
            pattern_id,
            executed_at,
            plan,
            seq_scan_detected: signals.seq_scan,
            index_scan_detected: signals.index_scan,
        }
    }

    #[must_use]
    pub fn planning_time_ms(&self) -> Option<f64> {
        self.plan.planning_time_ms
    }

    #[must_use]
    pub fn execution_time_ms(&self) -> Option<f64> {
        self.plan.execution_time_ms
    }

    /// Materializes the stored entity once the backend assigned an id.
    #[must_use]
    pub fn into_analysis(self, id: i64) -> PlanAnalysis {
        PlanAnalysis {
            id,
            pattern_id: self.pattern_id,
            executed_at: self.executed_at,
            planning_time_ms: self.plan.planning_time_ms,
            execution_time_ms: self.plan.execution_time_ms,
            plan: self.plan,
            seq_scan_detected: self.seq_scan_detected,
            index_scan_detected: self.index_scan_detected,
        }
    }
}

/// A validated recommendation, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecommendation {
    pub pattern_id: PatternId,
    pub generated_at: DateTime<Utc>,
    pub severity: Severity,
    pub summary: String,
    pub details: String,
    pub confidence_score: f64,
}

impl NewRecommendation {
    #[must_use]
    pub fn into_recommendation(self, id: i64) -> Recommendation {
        Recommendation {
            id,
            pattern_id: self.pattern_id,
            generated_at: self.generated_at,
            severity: self.severity,
            summary: self.summary,
            details: self.details,
            confidence_score: self.confidence_score,
        }
    }
}

/// Filters applied when selecting slow-query candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateThresholds {
    /// Minimum average duration, inclusive.
    pub slow_query_ms: f64,
    /// Minimum number of recorded executions, inclusive.
    pub min_executions: i64,
    /// Maximum number of candidates returned.
    pub limit: usize,
}

impl Default for CandidateThresholds {
    fn default() -> Self {
        Self {
            slow_query_ms: 500.0,
            min_executions: 5,
            limit: 10,
        }
    }
}

/// A pattern that is slow on average and executed often enough to matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowQueryCandidate {
    pub pattern: QueryPattern,
    pub avg_duration_ms: f64,
    pub execution_count: i64,
}

/// Filters, orders and truncates aggregated candidates.
///
/// Keeps entries whose average and count both meet the thresholds, orders by
/// average duration descending, then execution count descending, then
/// `first_seen_at` ascending, then pattern id ascending.
#[must_use]
pub fn rank_candidates(
    candidates: impl IntoIterator<Item = SlowQueryCandidate>,
    thresholds: &CandidateThresholds,
) -> Vec<SlowQueryCandidate> {
    let mut kept: Vec<SlowQueryCandidate> = candidates
        .into_iter()
        .filter(|c| {
            c.avg_duration_ms >= thresholds.slow_query_ms
                && c.execution_count >= thresholds.min_executions
        })
        .collect();

    kept.sort_by(|a, b| {
        b.avg_duration_ms
            .partial_cmp(&a.avg_duration_ms)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.execution_count.cmp(&a.execution_count))
            .then_with(|| a.pattern.first_seen_at.cmp(&b.pattern.first_seen_at))
            .then_with(|| a.pattern.id.cmp(&b.pattern.id))
    });
    kept.truncate(thresholds.limit);
    kept
}

/// A pattern together with everything recorded about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternOverview {
    pub pattern: QueryPattern,
    /// Newest first.
    pub executions: Vec<ExecutionRecord>,
    /// Newest first.
    pub analyses: Vec<PlanAnalysis>,
    /// Newest first.
    pub recommendations: Vec<Recommendation>,
}
