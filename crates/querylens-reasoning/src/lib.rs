//! Reasoning-service client for querylens.
//!
//! The recommendation engine talks to a chat-completions endpoint through the
//! [`ReasoningClient`] trait. [`HttpReasoningClient`] implements it for
//! OpenAI-compatible services and Azure OpenAI deployments.

mod client;
mod config;
mod error;
mod message;

pub use client::{HttpReasoningClient, ReasoningClient};
pub use config::{Provider, ReasoningConfig};
pub use error::ReasoningError;
pub use message::{ChatMessage, Role};

/// Type alias for a shared reasoning client.
pub type DynReasoningClient = std::sync::Arc<dyn ReasoningClient>;
