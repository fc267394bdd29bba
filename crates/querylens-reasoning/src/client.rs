//! Reasoning client trait and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::{Provider, ReasoningConfig};
use crate::error::ReasoningError;
use crate::message::ChatMessage;

/// A natural-language reasoning service: messages in, unstructured text out.
///
/// The output is untrusted. Callers validate it before acting on it.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ReasoningError>;
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client for OpenAI-compatible and Azure OpenAI endpoints.
pub struct HttpReasoningClient {
    http_client: Client,
    config: ReasoningConfig,
}

impl HttpReasoningClient {
    /// Builds a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ReasoningError::InvalidConfig`] if the configuration does not
    /// validate or the HTTP client cannot be built.
    pub fn new(config: ReasoningConfig) -> Result<Self, ReasoningError> {
        config.validate().map_err(ReasoningError::InvalidConfig)?;

        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ReasoningError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &ReasoningConfig {
        &self.config
    }
}

#[async_trait]
impl ReasoningClient for HttpReasoningClient {
    #[instrument(skip_all, fields(provider = ?self.config.provider, model = %self.config.model))]
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ReasoningError> {
        let body = CompletionRequest {
            // Azure selects the model through the deployment path.
            model: match self.config.provider {
                Provider::OpenAi => Some(self.config.model.as_str()),
                Provider::Azure => None,
            },
            messages,
            temperature: self.config.temperature,
        };

        let mut request = self
            .http_client
            .post(self.config.completions_url())
            .json(&body);

        request = match (self.config.provider, self.config.api_key.as_deref()) {
            (Provider::OpenAi, Some(key)) => request.bearer_auth(key),
            (Provider::Azure, Some(key)) => request.header("api-key", key),
            (_, None) => request,
        };
        if let (Provider::Azure, Some(version)) =
            (self.config.provider, self.config.api_version.as_deref())
        {
            request = request.query(&[("api-version", version)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReasoningError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ReasoningError::MalformedResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ReasoningError::EmptyResponse)?;

        debug!(chars = content.len(), "Reasoning service responded");
        Ok(content)
    }
}
