//! Profiling pipeline for querylens.
//!
//! - [`ExecutionRecorder`] listens to driver hooks and records every
//!   statement as an execution of its normalized pattern.
//! - [`CandidateSelector`] picks the patterns that are slow on average and
//!   run often enough to matter.
//! - [`PlanAnalyzer`] captures and stores an execution plan for a pattern;
//!   [`AnalysisPipeline`] does so for every current candidate.
//! - [`RecommendationEngine`] turns a stored analysis into a validated,
//!   confidence-scored recommendation.
//!
//! Everything talks to storage through `querylens_storage::ProfilerStorage`,
//! so the same pipeline runs against PostgreSQL or the in-memory backend.

pub mod analyzer;
pub mod candidates;
pub mod pipeline;
pub mod recommendation;
pub mod recorder;

#[cfg(test)]
mod test_support;

pub use analyzer::{AnalyzerError, PlanAnalyzer};
pub use candidates::{CandidateConfig, CandidateSelector, Slowness};
pub use pipeline::AnalysisPipeline;
pub use recommendation::{
    RecommendationConfig, RecommendationDraft, RecommendationEngine, RecommendationOutcome,
    ResponseError,
};
pub use recorder::{
    ExecutionRecorder, INTERNAL_TABLES, RecorderConfig, RecorderStats, RecorderStatsSnapshot,
    is_recording, without_recording,
};
