//! Reasoning service configuration.

use serde::{Deserialize, Serialize};

/// Flavor of chat-completions API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenAI-compatible: `POST {endpoint}/chat/completions`, bearer auth.
    #[default]
    OpenAi,
    /// Azure OpenAI: `POST {endpoint}/openai/deployments/{model}/chat/completions`,
    /// `api-key` header and `api-version` query parameter.
    Azure,
}

/// Configuration for [`HttpReasoningClient`](crate::HttpReasoningClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub provider: Provider,
    /// Base URL of the service.
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Model name, or the deployment name for Azure.
    pub model: String,
    /// Required for Azure.
    pub api_version: Option<String>,
    pub temperature: Option<f32>,
    /// Per-request HTTP timeout.
    pub timeout_ms: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: Provider::OpenAi,
            endpoint: "https://api.openai.com/v1".into(),
            api_key: None,
            model: "gpt-4o".into(),
            api_version: None,
            temperature: Some(0.0),
            timeout_ms: 60_000,
        }
    }
}

impl ReasoningConfig {
    /// Checks that the settings are usable for the selected provider.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        if self.endpoint.trim().is_empty() {
            return Err("reasoning endpoint must not be empty".into());
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(format!(
                "reasoning endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            ));
        }
        if self.model.trim().is_empty() {
            return Err("reasoning model must not be empty".into());
        }
        if self.provider == Provider::Azure && self.api_version.is_none() {
            return Err("api_version is required for the azure provider".into());
        }
        if let Some(t) = self.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(format!("temperature must lie within [0, 2], got {t}"));
        }
        if self.timeout_ms == 0 {
            return Err("reasoning timeout_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// URL the chat-completions request is sent to.
    #[must_use]
    pub fn completions_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        match self.provider {
            Provider::OpenAi => format!("{base}/chat/completions"),
            Provider::Azure => format!("{base}/openai/deployments/{}/chat/completions", self.model),
        }
    }
}
