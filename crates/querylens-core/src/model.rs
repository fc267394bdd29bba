//! Persisted entities.
//!
//! Executions, analyses and recommendations are owned by a [`QueryPattern`]
//! and are never mutated after they are written.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::plan::ExplainPlan;

/// Identifier of a stored query pattern.
pub type PatternId = i64;

/// A normalized SQL shape and its running totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPattern {
    pub id: PatternId,
    /// Canonical text with literals masked; unique across patterns.
    pub normalized_sql: String,
    /// Most recent literal statement observed for this pattern.
    pub raw_example_sql: String,
    /// Number of recorded executions.
    pub total_executions: i64,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// One observed run of a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: i64,
    pub pattern_id: PatternId,
    pub executed_at: DateTime<Utc>,
    pub duration_ms: f64,
    /// Rows returned, for read statements.
    pub rows_returned: Option<i64>,
    /// Rows changed, for write statements.
    pub rows_affected: Option<i64>,
    /// Driver error message, for failed statements.
    pub error: Option<String>,
}

/// One captured execution plan for a pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanAnalysis {
    pub id: i64,
    pub pattern_id: PatternId,
    pub executed_at: DateTime<Utc>,
    pub plan: ExplainPlan,
    pub planning_time_ms: Option<f64>,
    pub execution_time_ms: Option<f64>,
    pub seq_scan_detected: bool,
    pub index_scan_detected: bool,
}

/// A validated optimization recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: i64,
    pub pattern_id: PatternId,
    pub generated_at: DateTime<Utc>,
    pub severity: Severity,
    pub summary: String,
    pub details: String,
    /// Guardrailed confidence, never the raw external score.
    pub confidence_score: f64,
}

/// Recommendation severity. Decided by system policy, not by the reasoner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
}

impl Severity {
    /// Sequential scans are the strongest signal of a fixable problem.
    #[must_use]
    pub fn from_seq_scan(seq_scan_detected: bool) -> Self {
        if seq_scan_detected {
            Self::High
        } else {
            Self::Medium
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            other => Err(CoreError::UnknownSeverity(other.to_string())),
        }
    }
}
