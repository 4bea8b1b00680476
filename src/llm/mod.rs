//! LLM provider abstraction and implementations

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod openai;

#[cfg(test)]
pub mod testing;

pub use openai::OpenAiCompatibleProvider;

/// Default endpoint for the chat-completion API
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";

/// Default chat model
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Reasoning model offered as the alternative to [`DEFAULT_MODEL`]
pub const REASONER_MODEL: &str = "deepseek-reasoner";

/// Error types for LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Invalid model: {model}")]
    InvalidModel { model: String },

    #[error("Request failed: {status}: {message}")]
    RequestFailed { status: u16, message: String },

    #[error("Invalid response format: {message}")]
    InvalidResponse { message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

/// Represents a message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Role of a message in the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl Message {
    pub fn system<S: Into<String>>(content: S) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Response from LLM generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmResponse {
    pub content: Option<String>,
    pub finish_reason: String,
    pub usage: Option<TokenUsage>,
}

/// Token usage information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Model information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: Option<String>,
}

/// A chat-completion backend.
///
/// Every remote call in aide goes through this trait: file summaries, the
/// file-selection query and the final answer. Calls are single-shot; a
/// transport or API failure is returned to the caller without retrying.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name (e.g., "openai-compatible")
    fn provider_name(&self) -> &str;

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError>;

    /// Run one non-streaming completion over the given messages
    async fn generate(&self, messages: &[Message], model: &str) -> Result<LlmResponse, LlmError>;
}

/// Cut `text` down to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Send `system` + `history` + `user` and return the completion text.
///
/// The system message is truncated to `max_system_chars` to stay under the
/// upstream request-size limit.
pub async fn complete(
    provider: &dyn LlmProvider,
    model: &str,
    system: &str,
    history: &[Message],
    user: &str,
    max_system_chars: usize,
) -> Result<String, LlmError> {
    let truncated = truncate_chars(system, max_system_chars);
    if truncated.len() < system.len() {
        tracing::debug!("System prompt truncated to {} chars", max_system_chars);
    }
    let system = truncated;

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(Message::system(system));
    messages.extend(history.iter().cloned());
    messages.push(Message::user(user));

    let response = provider.generate(&messages, model).await?;
    response.content.ok_or_else(|| LlmError::InvalidResponse {
        message: "Completion has no content".to_string(),
    })
}

/// Factory for creating LLM providers
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create an OpenAI-compatible provider for the given endpoint
    pub fn create_provider(
        api_key: &str,
        base_url: Option<&str>,
        timeout_seconds: u64,
    ) -> Result<Box<dyn LlmProvider>, LlmError> {
        if api_key.trim().is_empty() {
            return Err(LlmError::Authentication {
                message: "API key not provided".to_string(),
            });
        }

        Ok(Box::new(OpenAiCompatibleProvider::with_config(
            api_key.to_string(),
            base_url.map(str::to_string),
            Some(std::time::Duration::from_secs(timeout_seconds)),
        )))
    }
}
