//! Errors raised by reasoning clients.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Response contained no message content")]
    EmptyResponse,
}

impl From<reqwest::Error> for ReasoningError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
