//! Chat-completion client for the tutoring pipeline
//!
//! Provides a `ChatCompletion` trait (the single request/response call the
//! pipeline needs) and an OpenAI-compatible implementation that posts to
//! `{base_url}/chat/completions`.
//!
//! There is no retry here: a failed call surfaces as `LlmError` and the caller
//! substitutes its own fallback.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;

// ============================================================================
// ChatCompletion trait
// ============================================================================

/// Role of a chat message sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Abstraction over chat-completion providers.
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Send an ordered conversation and return the text of the first choice.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError>;

    /// Provider name for logging.
    fn name(&self) -> &str;
}

/// Run `complete` under a hard deadline, mapping expiry to `LlmError::Timeout`.
pub async fn complete_bounded(
    llm: &dyn ChatCompletion,
    messages: &[ChatMessage],
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
) -> Result<String, LlmError> {
    match tokio::time::timeout(timeout, llm.complete(messages, temperature, max_tokens)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout {
            seconds: timeout.as_secs(),
        }),
    }
}

// ============================================================================
// Error types
// ============================================================================

/// Transport-level failures of a chat-completion call.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Missing message content in response")]
    MissingContent,

    #[error("Missing API key")]
    MissingApiKey,
}

// ============================================================================
// Config types
// ============================================================================

/// OpenAI-compatible client configuration
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl ChatClientConfig {
    /// Build from the `[llm]` section, reading the key from the named env var.
    pub fn from_llm_config(config: &LlmConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env).unwrap_or_default();

        Self {
            api_key,
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ============================================================================
// OpenAiChatClient
// ============================================================================

/// Chat client for any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiChatClient {
    client: Client,
    config: ChatClientConfig,
    base_url: String,
}

impl OpenAiChatClient {
    pub fn new(config: ChatClientConfig, base_url: impl Into<String>) -> Result<Self, LlmError> {
        if config.api_key.is_empty() {
            return Err(LlmError::MissingApiKey);
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            config,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_llm_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Self::new(ChatClientConfig::from_llm_config(config), config.base_url.clone())
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl ChatCompletion for OpenAiChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request = CompletionRequest {
            model: &self.config.model,
            messages,
            temperature,
            max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&error_body)
                .ok()
                .and_then(|e| e.error)
                .map(|e| e.message)
                .unwrap_or(error_body);

            tracing::error!(
                code = status.as_u16(),
                message = %message,
                "Chat completion API error"
            );

            return Err(LlmError::Api {
                code: status.as_u16(),
                message,
            });
        }

        let body: CompletionResponse = response.json().await?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::MissingContent)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}

// ============================================================================
// TESTS
// ============================================================================
