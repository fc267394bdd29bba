//! # querylens-storage
//!
//! Storage abstraction layer for querylens.
//!
//! This crate defines the traits and types every storage backend implements,
//! plus the backend-independent read surface built on top of them. It does
//! not contain any backend - those live in separate crates.
//!
//! ## Overview
//!
//! - [`ProfilerStorage`]: pattern upserts, execution history, plan analyses,
//!   recommendations and the batch reads behind [`load_pattern_overviews`]
//! - [`PlanCapture`]: running a statement under plan instrumentation
//! - [`rank_candidates`]: the slow-query ranking every backend must agree with

mod error;
mod overview;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use overview::load_pattern_overviews;
pub use traits::{PlanCapture, ProfilerStorage};
pub use types::{
    CandidateThresholds, NewExecution, NewPlanAnalysis, NewRecommendation, PatternOverview,
    SlowQueryCandidate, rank_candidates,
};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared storage trait object.
pub type DynStorage = std::sync::Arc<dyn ProfilerStorage>;

/// Type alias for a shared plan-capture trait object.
pub type DynPlanCapture = std::sync::Arc<dyn PlanCapture>;
