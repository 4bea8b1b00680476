//! In-process provider used by unit tests

use super::{LlmError, LlmProvider, LlmResponse, Message, ModelInfo};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One recorded `generate` call
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub model: String,
    pub messages: Vec<Message>,
}

/// Returns scripted replies in order and records every request.
///
/// Once the script is exhausted it answers `"ok"`. Requests whose messages
/// contain the `fail_on` marker fail with a `RequestFailed` error.
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<RecordedCall>>,
    fail_on: Option<String>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            calls: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        Ok(vec![ModelInfo {
            id: "scripted-model".to_string(),
            owned_by: None,
        }])
    }

    async fn generate(&self, messages: &[Message], model: &str) -> Result<LlmResponse, LlmError> {
        self.calls.lock().unwrap().push(RecordedCall {
            model: model.to_string(),
            messages: messages.to_vec(),
        });

        if let Some(marker) = &self.fail_on {
            if messages.iter().any(|m| m.content.contains(marker.as_str())) {
                return Err(LlmError::RequestFailed {
                    status: 500,
                    message: format!("scripted failure on {}", marker),
                });
            }
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "ok".to_string());

        Ok(LlmResponse {
            content: Some(reply),
            finish_reason: "stop".to_string(),
            usage: None,
        })
    }
}
