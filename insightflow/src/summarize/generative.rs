//! Generative summarization behind a pluggable capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::GenerativeConfig;
use crate::errors::InsightError;

/// A capability that turns text into a shorter text.
///
/// Implementations may block on remote services; the caller enforces a
/// timeout and falls back to the extractive baseline on any error.
#[async_trait]
pub trait GenerativeSummarizer: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Produces a summary of at most roughly `max_sentences` sentences.
    async fn generate(&self, text: &str, max_sentences: usize) -> Result<String, InsightError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Summarizer backed by an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct ChatCompletionSummarizer {
    http_client: reqwest::Client,
    config: GenerativeConfig,
}

impl ChatCompletionSummarizer {
    /// Creates a summarizer for the configured endpoint.
    pub fn new(config: GenerativeConfig) -> Result<Self, InsightError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http_client,
            config,
        })
    }

    /// Gets the configuration.
    #[must_use]
    pub fn config(&self) -> &GenerativeConfig {
        &self.config
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl GenerativeSummarizer for ChatCompletionSummarizer {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, text: &str, max_sentences: usize) -> Result<String, InsightError> {
        let start = Instant::now();
        let instruction = format!(
            "Summarize the user's text in at most {max_sentences} sentences. \
             Reply with the summary only."
        );
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &instruction,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            max_tokens: self.config.max_output_tokens,
            temperature: 0.2,
        };

        let mut builder = self.http_client.post(self.url()).json(&request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(error = %e, "Summarizer request failed");
            InsightError::SummarizationDegraded(format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(InsightError::SummarizationDegraded(format!(
                "summarizer returned {status}: {error_text}"
            )));
        }

        let raw: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| InsightError::SummarizationDegraded(format!("bad response: {e}")))?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| InsightError::SummarizationDegraded("empty completion".into()))?;

        debug!(
            model = %self.config.model,
            duration_ms = start.elapsed().as_millis(),
            "Generated summary"
        );
        Ok(content)
    }
}
