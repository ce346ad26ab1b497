//! Error types for the insightflow pipeline.
//!
//! Failures are contained at the smallest scope possible: a failed URL is
//! recorded in its [`PageInsight`](crate::models::PageInsight), a failed
//! generative summary degrades to the extractive baseline, and a failed
//! search yields an empty report. Only invalid input and broken configuration
//! surface to the caller as errors.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for insightflow operations.
#[derive(Debug, Error)]
pub enum InsightError {
    /// The caller supplied an empty query or a non-positive count.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The search provider failed or timed out.
    #[error("Search unavailable: {0}")]
    SearchUnavailable(String),

    /// A single URL could not be fetched or parsed.
    #[error("Fetch failed for {url}: {reason}")]
    FetchFailed {
        /// The URL that failed.
        url: String,
        /// Classified failure reason.
        reason: String,
    },

    /// The generative summarizer failed and the extractive baseline was used.
    #[error("Summarization degraded: {0}")]
    SummarizationDegraded(String),

    /// The run was cancelled or its deadline passed.
    #[error("Pipeline cancelled: {0}")]
    Cancelled(String),

    /// An HTTP client error outside a per-URL fetch.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

}

impl InsightError {
    /// Creates an invalid input error.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Creates a fetch failure for a URL.
    #[must_use]
    pub fn fetch_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Stable snake_case code, used as a structured log field.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::SearchUnavailable(_) => "search_unavailable",
            Self::FetchFailed { .. } => "fetch_failed",
            Self::SummarizationDegraded(_) => "summarization_degraded",
            Self::Cancelled(_) => "cancelled",
            Self::Http(_) => "http",
            Self::Config(_) => "config",
        }
    }

    /// Whether this error is surfaced to the caller instead of being
    /// recorded in the report.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::Config(_))
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code()));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        if let Self::FetchFailed { url, reason } = self {
            map.insert("url".to_string(), serde_json::json!(url));
            map.insert("reason".to_string(), serde_json::json!(reason));
        }
        map
    }
}

impl From<reqwest::Error> for InsightError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// Errors at the prediction-service boundary.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
pub enum PredictionError {
    /// No model is registered under the identifier.
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// The feature vector has the wrong length or contains non-finite values.
    #[error("Malformed input for model '{model}': {message}")]
    MalformedInput {
        /// The model identifier.
        model: String,
        /// What was wrong with the input.
        message: String,
    },

    /// A model file could not be loaded.
    #[error("Failed to load model from {path}: {message}")]
    Load {
        /// The file that failed.
        path: String,
        /// The underlying error.
        message: String,
    },
}

impl PredictionError {
    /// Creates a malformed input error.
    #[must_use]
    pub fn malformed(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            model: model.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(InsightError::invalid_input("empty").code(), "invalid_input");
        assert_eq!(
            InsightError::SearchUnavailable("down".into()).code(),
            "search_unavailable"
        );
        assert_eq!(
            InsightError::fetch_failed("https://a.example", "timeout").code(),
            "fetch_failed"
        );
    }

    #[test]
    fn test_only_input_and_config_are_fatal() {
        assert!(InsightError::invalid_input("x").is_fatal());
        assert!(InsightError::Config("x".into()).is_fatal());
        assert!(!InsightError::SearchUnavailable("x".into()).is_fatal());
        assert!(!InsightError::fetch_failed("u", "r").is_fatal());
        assert!(!InsightError::SummarizationDegraded("x".into()).is_fatal());
        assert!(!InsightError::Cancelled("x".into()).is_fatal());
    }

    #[test]
    fn test_fetch_failed_to_dict() {
        let err = InsightError::fetch_failed("https://a.example/page", "http status 404");
        let dict = err.to_dict();

        assert_eq!(dict.get("code").unwrap(), "fetch_failed");
        assert_eq!(dict.get("url").unwrap(), "https://a.example/page");
        assert_eq!(dict.get("reason").unwrap(), "http status 404");
        assert!(err.to_string().contains("http status 404"));
    }

    #[test]
    fn test_cancelled_carries_reason() {
        let err = InsightError::Cancelled("deadline".into());
        assert_eq!(err.code(), "cancelled");
        assert_eq!(err.to_string(), "Pipeline cancelled: deadline");
    }

    #[test]
    fn test_prediction_error_display() {
        let err = PredictionError::malformed("grid", "expected 5 features, got 3");
        assert_eq!(
            err.to_string(),
            "Malformed input for model 'grid': expected 5 features, got 3"
        );
        assert_eq!(
            PredictionError::UnknownModel("nope".into()).to_string(),
            "Unknown model: nope"
        );
    }
}
