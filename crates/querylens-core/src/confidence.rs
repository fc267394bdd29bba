//! Confidence guardrails for externally produced recommendations.
//!
//! The score a reasoning service attaches to its own output is never stored
//! as-is. [`ConfidencePolicy::apply`] discounts it by the strength of the
//! evidence the system observed itself and bounds it to a fixed band.

use serde::{Deserialize, Serialize};

/// Deterministic post-processing of a raw confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidencePolicy {
    /// Lowest score a valid recommendation can carry.
    pub floor: f64,
    /// Highest score a valid recommendation can carry.
    pub ceiling: f64,
    /// Multiplier applied when the plan shows no sequential scan.
    pub no_seq_scan_factor: f64,
    /// Multiplier applied when execution time is unknown or below
    /// `low_impact_threshold_ms`.
    pub low_impact_factor: f64,
    /// Execution time under which a finding counts as low impact.
    pub low_impact_threshold_ms: f64,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            floor: 0.1,
            ceiling: 0.95,
            no_seq_scan_factor: 0.8,
            low_impact_factor: 0.8,
            low_impact_threshold_ms: 200.0,
        }
    }
}

impl ConfidencePolicy {
    /// Computes the stored confidence for a raw score.
    ///
    /// Steps, in order: clamp to `[0, 1]` (non-finite input counts as `0`),
    /// apply the evidence penalties, clamp to `[floor, ceiling]`, round to two
    /// decimal places.
    #[must_use]
    pub fn apply(&self, raw: f64, seq_scan_detected: bool, execution_time_ms: Option<f64>) -> f64 {
        let mut confidence = if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            0.0
        };

        if !seq_scan_detected {
            confidence *= self.no_seq_scan_factor;
        }

        let low_impact = execution_time_ms.is_none_or(|ms| ms < self.low_impact_threshold_ms);
        if low_impact {
            confidence *= self.low_impact_factor;
        }

        // max/min rather than clamp: a misconfigured band must not panic here.
        round2(confidence.max(self.floor).min(self.ceiling))
    }

    /// Checks that the band and factors are coherent.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated constraint.
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.floor) || !(0.0..=1.0).contains(&self.ceiling) {
            return Err("confidence floor and ceiling must lie within [0, 1]".into());
        }
        if self.floor > self.ceiling {
            return Err("confidence floor must not exceed ceiling".into());
        }
        for (name, factor) in [
            ("no_seq_scan_factor", self.no_seq_scan_factor),
            ("low_impact_factor", self.low_impact_factor),
        ] {
            if factor.is_nan() || factor <= 0.0 || factor > 1.0 {
                return Err(format!("{name} must lie within (0, 1]"));
            }
        }
        if self.low_impact_threshold_ms.is_nan() || self.low_impact_threshold_ms < 0.0 {
            return Err("low_impact_threshold_ms must be >= 0".into());
        }
        Ok(())
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
