//! Summarization of normalized documents.
//!
//! The extractive baseline is deterministic and always available. An
//! optional [`GenerativeSummarizer`] may be plugged in; it runs under its own
//! timeout and any failure degrades silently to the baseline.

mod generative;
mod sentences;

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub use generative::{ChatCompletionSummarizer, GenerativeSummarizer};
pub use sentences::split_sentences;

use crate::config::SummarizerConfig;
use crate::errors::InsightError;
use crate::models::{NormalizedDocument, Summary, SummaryKind};

/// Documents with at most this many sentences are returned verbatim.
pub const VERBATIM_SENTENCE_LIMIT: usize = 3;

/// Returns the document verbatim if it has at most three sentences,
/// otherwise its first `max_sentences` sentences joined with single spaces.
///
/// Empty documents yield `None`.
#[must_use]
pub fn extractive_summary(doc: &NormalizedDocument, max_sentences: usize) -> Option<Summary> {
    if doc.is_empty() {
        return None;
    }
    let sentences = split_sentences(doc.as_str());
    if sentences.len() <= VERBATIM_SENTENCE_LIMIT {
        return Some(Summary::new(doc.as_str(), SummaryKind::Verbatim));
    }
    let text = sentences[..max_sentences.clamp(1, sentences.len())].join(" ");
    Some(Summary::new(text, SummaryKind::Extractive))
}

/// Produces summaries with an optional generative backend and a mandatory
/// extractive fallback.
#[derive(Clone)]
pub struct Summarizer {
    config: SummarizerConfig,
    generator: Option<Arc<dyn GenerativeSummarizer>>,
    generator_timeout: Duration,
}

impl std::fmt::Debug for Summarizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Summarizer")
            .field("min_content_chars", &self.config.min_content_chars)
            .field("generator", &self.generator.as_ref().map(|g| g.name().to_string()))
            .field("generator_timeout", &self.generator_timeout)
            .finish()
    }
}

impl Summarizer {
    /// Creates an extractive-only summarizer.
    #[must_use]
    pub fn extractive(config: SummarizerConfig) -> Self {
        let generator_timeout = config
            .generative
            .as_ref()
            .map_or(Duration::from_secs(15), crate::config::GenerativeConfig::timeout);
        Self {
            config,
            generator: None,
            generator_timeout,
        }
    }

    /// Creates a summarizer from configuration, wiring the chat-completion
    /// backend when one is configured.
    pub fn from_config(config: SummarizerConfig) -> Result<Self, InsightError> {
        let generator = match config.generative.clone() {
            Some(g) => Some(Arc::new(ChatCompletionSummarizer::new(g)?) as Arc<dyn GenerativeSummarizer>),
            None => None,
        };
        let mut summarizer = Self::extractive(config);
        summarizer.generator = generator;
        Ok(summarizer)
    }

    /// Plugs in a generative backend with its own timeout.
    #[must_use]
    pub fn with_generator(mut self, generator: Arc<dyn GenerativeSummarizer>, timeout: Duration) -> Self {
        self.generator = Some(generator);
        self.generator_timeout = timeout;
        self
    }

    /// The placeholder used for failed or too-short documents.
    #[must_use]
    pub fn placeholder(&self) -> &str {
        &self.config.placeholder
    }

    /// Summarizes a document.
    ///
    /// Documents shorter than the minimum content threshold get the
    /// placeholder. Documents of at most three sentences are returned
    /// verbatim without consulting the generator. Never fails and never
    /// returns empty text.
    pub async fn summarize(&self, doc: &NormalizedDocument, max_sentences: usize) -> Summary {
        if doc.char_count() < self.config.min_content_chars {
            return Summary::placeholder(self.placeholder());
        }
        if split_sentences(doc.as_str()).len() <= VERBATIM_SENTENCE_LIMIT {
            return Summary::new(doc.as_str(), SummaryKind::Verbatim);
        }

        if let Some(ref generator) = self.generator {
            match tokio::time::timeout(
                self.generator_timeout,
                generator.generate(doc.as_str(), max_sentences),
            )
            .await
            {
                Ok(Ok(text)) if !text.trim().is_empty() => {
                    return Summary::new(text.trim(), SummaryKind::Generated);
                }
                Ok(Ok(_)) => {
                    self.degraded(generator.name(), "empty summary");
                }
                Ok(Err(e)) => {
                    self.degraded(generator.name(), &e.to_string());
                }
                Err(_) => {
                    self.degraded(
                        generator.name(),
                        &format!("timed out after {:?}", self.generator_timeout),
                    );
                }
            }
        }

        extractive_summary(doc, max_sentences)
            .unwrap_or_else(|| Summary::placeholder(self.placeholder()))
    }

    #[allow(clippy::unused_self)]
    fn degraded(&self, generator: &str, reason: &str) {
        let err = InsightError::SummarizationDegraded(reason.to_string());
        warn!(generator = %generator, code = err.code(), error = %err, "Falling back to extractive summary");
    }
}
