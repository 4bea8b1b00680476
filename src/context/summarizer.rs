//! Per-file summary generation

use crate::llm::{self, LlmError, LlmProvider};
use std::sync::Arc;

/// Longest input (in characters, prompt prefix included) sent for one file
pub const DEFAULT_MAX_INPUT_CHARS: usize = 65_000;

const FILE_PREFIX: &str = "This is a source file:\n";

const SUMMARY_INSTRUCTION: &str = "Summarize this file in no more than 300 words, as plain \
prose without markdown formatting. If it is a code file, analyze the code and concisely list \
the functionality it implements and its inheritance relationships. If it is a script, describe \
its commands in detail and explain how to run it. Keep the total under 300 words and do not \
use markdown.";

/// Produces bounded-length natural-language summaries of single files
#[derive(Clone)]
pub struct Summarizer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_input_chars: usize,
}

impl Summarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }

    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Summarize `content`. Over-long input is truncated, never rejected.
    /// Transport and API errors are returned as is.
    pub async fn summarize(&self, content: &str) -> Result<String, LlmError> {
        let system = format!("{}{}", FILE_PREFIX, content);
        llm::complete(
            self.provider.as_ref(),
            &self.model,
            &system,
            &[],
            SUMMARY_INSTRUCTION,
            self.max_input_chars,
        )
        .await
    }
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.model)
            .field("max_input_chars", &self.max_input_chars)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;
    use crate::llm::MessageRole;

    #[tokio::test]
    async fn test_summarize_sends_content_and_instruction() {
        let provider = Arc::new(ScriptedProvider::new(vec!["A tiny script."]));
        let summarizer = Summarizer::new(provider.clone(), "deepseek-chat");

        let summary = summarizer.summarize("echo hi").await.unwrap();
        assert_eq!(summary, "A tiny script.");

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].model, "deepseek-chat");
        assert_eq!(calls[0].messages[0].role, MessageRole::System);
        assert!(calls[0].messages[0].content.ends_with("echo hi"));
        assert!(calls[0].messages[1].content.contains("300 words"));
    }

    #[tokio::test]
    async fn test_long_input_is_truncated() {
        let provider = Arc::new(ScriptedProvider::new(vec![]));
        let summarizer = Summarizer::new(provider.clone(), "m").with_max_input_chars(40);

        summarizer.summarize(&"x".repeat(1000)).await.unwrap();
        let sent = &provider.calls()[0].messages[0].content;
        assert_eq!(sent.chars().count(), 40);
        assert!(sent.starts_with(FILE_PREFIX));
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let provider = Arc::new(ScriptedProvider::new(vec![]).failing_on("boom"));
        let summarizer = Summarizer::new(provider, "m");
        assert!(summarizer.summarize("boom").await.is_err());
    }
}
