//! Core types and pure logic for querylens.
//!
//! This crate holds everything that does not touch a database or the network:
//!
//! - [`model`]: the persisted entities (patterns, executions, analyses, recommendations)
//! - [`fingerprint`]: literal masking that turns raw SQL into a pattern key
//! - [`plan`]: the execution-plan tree and scan-type detection
//! - [`confidence`]: deterministic guardrails applied to external confidence scores
//! - [`hooks`]: the statement lifecycle interface that driver adapters call into

pub mod confidence;
pub mod error;
pub mod fingerprint;
pub mod hooks;
pub mod model;
pub mod plan;

pub use confidence::ConfidencePolicy;
pub use error::{CoreError, Result};
pub use fingerprint::{is_read_only_statement, normalize_sql};
pub use hooks::{ExecutionContext, Statement, StatementListener, StatementOutcome};
pub use model::{
    ExecutionRecord, PatternId, PlanAnalysis, QueryPattern, Recommendation, Severity,
};
pub use plan::{ExplainPlan, INDEX_SCAN, PlanNode, SEQ_SCAN, ScanSignals};
