//! Slow-query candidate selection.

use querylens_storage::{CandidateThresholds, DynStorage, SlowQueryCandidate, StorageError};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Default average duration at which a pattern counts as slow.
const DEFAULT_SLOW_QUERY_MS: f64 = 500.0;

/// Default average duration at which a pattern counts as very slow.
const DEFAULT_VERY_SLOW_QUERY_MS: f64 = 2000.0;

/// Thresholds for candidate selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateConfig {
    /// Minimum average duration in milliseconds, inclusive.
    pub slow_query_ms: f64,
    /// Average duration in milliseconds from which a candidate is labelled
    /// very slow. Only affects reporting.
    pub very_slow_query_ms: f64,
    /// Minimum number of executions, inclusive. Keeps one-off outliers out.
    pub min_executions: i64,
    /// Candidates returned when the caller does not pass a limit.
    pub limit: usize,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            slow_query_ms: DEFAULT_SLOW_QUERY_MS,
            very_slow_query_ms: DEFAULT_VERY_SLOW_QUERY_MS,
            min_executions: 5,
            limit: 10,
        }
    }
}

impl CandidateConfig {
    /// Checks that thresholds are usable.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid threshold.
    pub fn validate(&self) -> Result<(), String> {
        if !self.slow_query_ms.is_finite() || self.slow_query_ms < 0.0 {
            return Err("slow_query_ms must be a non-negative number".into());
        }
        if !self.very_slow_query_ms.is_finite() || self.very_slow_query_ms < self.slow_query_ms {
            return Err("very_slow_query_ms must be >= slow_query_ms".into());
        }
        if self.min_executions < 1 {
            return Err("min_executions must be at least 1".into());
        }
        Ok(())
    }

    /// The storage-level filter for a selection of at most `limit` entries.
    #[must_use]
    pub fn thresholds(&self, limit: usize) -> CandidateThresholds {
        CandidateThresholds {
            slow_query_ms: self.slow_query_ms,
            min_executions: self.min_executions,
            limit,
        }
    }

    /// How slow a candidate is relative to the configured thresholds.
    #[must_use]
    pub fn classify(&self, candidate: &SlowQueryCandidate) -> Slowness {
        if candidate.avg_duration_ms >= self.very_slow_query_ms {
            Slowness::VerySlow
        } else {
            Slowness::Slow
        }
    }
}

/// Reporting label for a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slowness {
    Slow,
    VerySlow,
}

impl Slowness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slow => "slow",
            Self::VerySlow => "very slow",
        }
    }
}

impl std::fmt::Display for Slowness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks the patterns worth analyzing.
pub struct CandidateSelector {
    storage: DynStorage,
    config: CandidateConfig,
}

impl CandidateSelector {
    pub fn new(storage: DynStorage, config: CandidateConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &CandidateConfig {
        &self.config
    }

    /// Patterns slow on average and executed often enough, slowest first.
    ///
    /// Ordered by average duration, then execution count, then first
    /// observation. At most `limit` entries.
    #[instrument(skip(self))]
    pub async fn select_candidates(
        &self,
        limit: usize,
    ) -> Result<Vec<SlowQueryCandidate>, StorageError> {
        let candidates = self
            .storage
            .slow_query_candidates(&self.config.thresholds(limit))
            .await?;
        debug!(count = candidates.len(), "Selected slow-query candidates");
        Ok(candidates)
    }

    /// [`select_candidates`](Self::select_candidates) with the configured limit.
    pub async fn select_default(&self) -> Result<Vec<SlowQueryCandidate>, StorageError> {
        self.select_candidates(self.config.limit).await
    }
}
