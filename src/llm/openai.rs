//! OpenAI-compatible chat-completion provider

use super::{LlmError, LlmProvider, LlmResponse, Message, ModelInfo, TokenUsage, DEFAULT_BASE_URL};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Provider for any endpoint speaking the OpenAI chat-completion protocol
/// (DeepSeek, OpenAI, OpenRouter, local gateways).
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiCompatibleProvider {
    /// Create a new provider against the default endpoint
    pub fn new(api_key: String) -> Self {
        Self::with_config(api_key, None, None)
    }

    /// Create a new provider with custom configuration
    pub fn with_config(api_key: String, base_url: Option<String>, timeout: Option<Duration>) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn create_headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|_| {
            LlmError::Authentication {
                message: "API key contains characters not allowed in a header".to_string(),
            }
        })?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Parse error response and return appropriate LlmError
    fn parse_error_response(status: u16, body: &str, model: Option<&str>) -> LlmError {
        match status {
            429 => LlmError::RateLimit,
            401 | 403 => LlmError::Authentication {
                message: "Invalid API key or insufficient permissions".to_string(),
            },
            400 | 404 if body.contains("model") && (body.contains("not found") || body.contains("not exist")) => {
                LlmError::InvalidModel {
                    model: model.unwrap_or("unknown").to_string(),
                }
            }
            _ => LlmError::RequestFailed {
                status,
                message: body.to_string(),
            },
        }
    }

    /// Build the JSON request body for a completion
    fn request_body(messages: &[Message], model: &str) -> Result<serde_json::Value, LlmError> {
        Ok(serde_json::json!({
            "model": model,
            "messages": serde_json::to_value(messages)?,
            "stream": false,
        }))
    }

    /// Extract the first choice from a completion response body
    fn parse_completion(body: &serde_json::Value) -> Result<LlmResponse, LlmError> {
        if let Some(error) = body.get("error") {
            return Err(LlmError::RequestFailed {
                status: 400,
                message: error.to_string(),
            });
        }

        let choice = body["choices"][0]
            .as_object()
            .ok_or_else(|| LlmError::InvalidResponse {
                message: "No choices in response".to_string(),
            })?;

        let content = choice
            .get("message")
            .and_then(|m| m["content"].as_str())
            .map(|s| s.to_string());

        let finish_reason = choice
            .get("finish_reason")
            .and_then(|r| r.as_str())
            .unwrap_or("unknown")
            .to_string();

        let usage = body["usage"].as_object().map(|u| TokenUsage {
            prompt_tokens: u["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            completion_tokens: u["completion_tokens"].as_u64().unwrap_or(0) as u32,
            total_tokens: u["total_tokens"].as_u64().unwrap_or(0) as u32,
        });

        Ok(LlmResponse {
            content,
            finish_reason,
            usage,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn provider_name(&self) -> &str {
        "openai-compatible"
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .headers(self.create_headers()?)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, &body, None));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| LlmError::InvalidResponse {
            message: format!("Failed to parse models response: {}", e),
        })?;

        let data = body["data"].as_array().ok_or_else(|| LlmError::InvalidResponse {
            message: "Expected 'data' array in response".to_string(),
        })?;

        Ok(data
            .iter()
            .filter_map(|model| {
                model["id"].as_str().map(|id| ModelInfo {
                    id: id.to_string(),
                    owned_by: model["owned_by"].as_str().map(|s| s.to_string()),
                })
            })
            .collect())
    }

    async fn generate(&self, messages: &[Message], model: &str) -> Result<LlmResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request_body = Self::request_body(messages, model)?;

        tracing::debug!("POST {} model={} messages={}", url, model, messages.len());

        let response = self
            .client
            .post(&url)
            .headers(self.create_headers()?)
            .json(&request_body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::parse_error_response(status, &body, Some(model)));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| LlmError::InvalidResponse {
            message: format!("Failed to parse generation response: {}", e),
        })?;

        let parsed = Self::parse_completion(&body)?;
        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                "Completion used {} prompt + {} completion tokens",
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let provider = OpenAiCompatibleProvider::with_config(
            "key".to_string(),
            Some("https://example.com/v1/".to_string()),
            None,
        );
        assert_eq!(provider.base_url(), "https://example.com/v1");
        assert_eq!(OpenAiCompatibleProvider::new("k".into()).base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_request_body_is_non_streaming() {
        let messages = vec![Message::system("sys"), Message::user("hi")];
        let body = OpenAiCompatibleProvider::request_body(&messages, "deepseek-chat").unwrap();
        assert_eq!(body["model"], "deepseek-chat");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn test_parse_completion_reads_first_choice() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
        });
        let response = OpenAiCompatibleProvider::parse_completion(&body).unwrap();
        assert_eq!(response.content.as_deref(), Some("hello"));
        assert_eq!(response.finish_reason, "stop");
        assert_eq!(response.usage.unwrap().total_tokens, 4);
    }

    #[test]
    fn test_parse_completion_without_choices_fails() {
        let body = serde_json::json!({"choices": []});
        assert!(matches!(
            OpenAiCompatibleProvider::parse_completion(&body),
            Err(LlmError::InvalidResponse { .. })
        ));

        let body = serde_json::json!({"error": {"message": "bad"}});
        assert!(matches!(
            OpenAiCompatibleProvider::parse_completion(&body),
            Err(LlmError::RequestFailed { .. })
        ));
    }

    #[test]
    fn test_error_status_mapping() {
        assert!(matches!(
            OpenAiCompatibleProvider::parse_error_response(401, "", None),
            LlmError::Authentication { .. }
        ));
        assert!(matches!(
            OpenAiCompatibleProvider::parse_error_response(429, "", None),
            LlmError::RateLimit
        ));
        match OpenAiCompatibleProvider::parse_error_response(400, "model not found", Some("x")) {
            LlmError::InvalidModel { model } => assert_eq!(model, "x"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            OpenAiCompatibleProvider::parse_error_response(502, "gateway", None),
            LlmError::RequestFailed { status: 502, .. }
        ));
    }
}
