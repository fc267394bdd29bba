//! Batch analysis of the current slow-query candidates.

use querylens_core::{PlanAnalysis, is_read_only_statement};
use querylens_storage::StorageError;
use tracing::{info, instrument, warn};

use crate::analyzer::PlanAnalyzer;
use crate::candidates::CandidateSelector;

/// Selects candidates and analyzes each of them.
pub struct AnalysisPipeline {
    selector: CandidateSelector,
    analyzer: PlanAnalyzer,
}

impl AnalysisPipeline {
    pub fn new(selector: CandidateSelector, analyzer: PlanAnalyzer) -> Self {
        Self { selector, analyzer }
    }

    pub fn selector(&self) -> &CandidateSelector {
        &self.selector
    }

    /// Analyzes up to `limit` candidates, slowest first.
    ///
    /// Candidates whose example statement could modify data are skipped, as
    /// plan capture executes the statement. A failing candidate is logged and
    /// does not stop the batch.
    ///
    /// # Errors
    ///
    /// Only candidate selection itself can fail the batch.
    #[instrument(skip(self))]
    pub async fn analyze_slow_queries(
        &self,
        limit: usize,
    ) -> Result<Vec<PlanAnalysis>, StorageError> {
        let candidates = self.selector.select_candidates(limit).await?;
        let total = candidates.len();
        let mut analyses = Vec::with_capacity(total);

        for candidate in candidates {
            let pattern = &candidate.pattern;
            if !is_read_only_statement(&pattern.raw_example_sql) {
                warn!(
                    pattern_id = pattern.id,
                    "Skipping candidate: example statement is not read-only"
                );
                continue;
            }

            match self
                .analyzer
                .analyze(pattern.id, &pattern.raw_example_sql)
                .await
            {
                Ok(analysis) => analyses.push(analysis),
                Err(e) => warn!(pattern_id = pattern.id, error = %e, "Candidate analysis failed"),
            }
        }

        info!(candidates = total, analyzed = analyses.len(), "Slow-query analysis finished");
        Ok(analyses)
    }
}
