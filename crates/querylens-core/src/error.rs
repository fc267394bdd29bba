//! Error types for querylens core logic.

/// Errors raised by pure core operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The execution plan document could not be interpreted.
    #[error("Invalid execution plan: {0}")]
    InvalidPlan(String),

    /// A stored severity value is not one of the known levels.
    #[error("Unknown severity: {0}")]
    UnknownSeverity(String),
}

impl CoreError {
    /// Creates a new invalid-plan error.
    #[must_use]
    pub fn invalid_plan(message: impl Into<String>) -> Self {
        Self::InvalidPlan(message.into())
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
