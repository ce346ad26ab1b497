//! Configuration types for search, fetching, extraction and summarization.
//!
//! A [`PipelineConfig`] is built once at startup, validated, and then shared
//! read-only by every pipeline run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::errors::InsightError;

/// Default user agent for outbound requests.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; insightflow/0.1; +https://github.com/insightflow/insightflow)";

/// Default DuckDuckGo HTML endpoint.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Placeholder summary used when a page has too little content.
pub const INSUFFICIENT_CONTENT: &str = "insufficient content to summarize";

/// Configuration for the search dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Timeout for a single provider call in seconds.
    #[serde(default = "default_search_timeout")]
    pub timeout_seconds: f64,
    /// Largest `num_results` a caller may request.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Search endpoint URL.
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Retry configuration for provider calls.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_search_timeout() -> f64 {
    10.0
}

fn default_max_results() -> usize {
    20
}

fn default_search_endpoint() -> String {
    DEFAULT_SEARCH_ENDPOINT.to_string()
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_search_timeout(),
            max_results: default_max_results(),
            endpoint: default_search_endpoint(),
            user_agent: default_user_agent(),
            retry: RetryConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Sets the provider timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }
}

/// Upper bound on additional search attempts.
pub const MAX_SEARCH_RETRIES: usize = 5;

/// Retry configuration for provider calls.
///
/// The provider is assumed to back off internally, so the default performs
/// no retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first call.
    #[serde(default)]
    pub max_retries: usize,
    /// Initial delay between retries in seconds.
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: f64,
    /// Backoff multiplier.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    /// Maximum delay between retries.
    #[serde(default = "default_max_delay")]
    pub max_delay_seconds: f64,
}

fn default_retry_delay() -> f64 {
    1.0
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> f64 {
    8.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay_seconds: default_retry_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            max_delay_seconds: default_max_delay(),
        }
    }
}

impl RetryConfig {
    /// A retry policy with `max_retries` attempts and default backoff.
    #[must_use]
    pub fn with_max_retries(max_retries: usize) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Calculates the delay for a given attempt.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.retry_delay_seconds * self.backoff_multiplier.powi(exponent);
        let capped = delay.min(self.max_delay_seconds).max(0.0);
        Duration::try_from_secs_f64(capped).unwrap_or_default()
    }

    fn validate(&self) -> Result<(), InsightError> {
        if self.max_retries > MAX_SEARCH_RETRIES {
            return Err(InsightError::Config(format!(
                "search.retry.max_retries must be at most {MAX_SEARCH_RETRIES}"
            )));
        }
        check_non_negative("search.retry.retry_delay_seconds", self.retry_delay_seconds)?;
        check_non_negative("search.retry.max_delay_seconds", self.max_delay_seconds)?;
        if !(self.backoff_multiplier.is_finite() && self.backoff_multiplier >= 1.0) {
            return Err(InsightError::Config(
                "search.retry.backoff_multiplier must be a finite number of at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration for HTTP fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Total request timeout (connect + read) in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_seconds: f64,
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: f64,
    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Maximum response size in bytes.
    #[serde(default = "default_max_size")]
    pub max_response_size: usize,
    /// Additional headers to include.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

fn default_fetch_timeout() -> f64 {
    10.0
}

fn default_connect_timeout() -> f64 {
    5.0
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_size() -> usize {
    2 * 1024 * 1024 // 2MB
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_fetch_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
            max_response_size: default_max_size(),
            headers: HashMap::new(),
        }
    }
}

impl FetchConfig {
    /// Creates a new fetch configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }

    /// Gets connect timeout as Duration.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.connect_timeout_seconds)
    }
}

/// Configuration for readable content extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Character cap applied to extracted text before normalization.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Pages with less extracted text than this are classified as failed.
    #[serde(default = "default_min_text")]
    pub min_text_length: usize,
    /// CSS selectors for elements to remove.
    #[serde(default = "default_remove_selectors")]
    pub remove_selectors: Vec<String>,
    /// CSS selectors for main content.
    #[serde(default = "default_content_selectors")]
    pub main_content_selectors: Vec<String>,
}

fn default_max_chars() -> usize {
    5000
}

fn default_min_text() -> usize {
    200
}

fn default_remove_selectors() -> Vec<String> {
    vec![
        "script".to_string(),
        "style".to_string(),
        "noscript".to_string(),
        "iframe".to_string(),
        "svg".to_string(),
        "nav".to_string(),
        "footer".to_string(),
        "header".to_string(),
        "aside".to_string(),
        "form".to_string(),
        ".ad".to_string(),
        ".ads".to_string(),
        ".advertisement".to_string(),
        ".sidebar".to_string(),
        ".cookie-banner".to_string(),
        ".cookie-notice".to_string(),
        "#cookie-banner".to_string(),
    ]
}

fn default_content_selectors() -> Vec<String> {
    vec![
        "article".to_string(),
        "main".to_string(),
        "[role=\"main\"]".to_string(),
        "#content".to_string(),
        ".content".to_string(),
        ".post-content".to_string(),
        ".article-content".to_string(),
        ".entry-content".to_string(),
    ]
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            min_text_length: default_min_text(),
            remove_selectors: default_remove_selectors(),
            main_content_selectors: default_content_selectors(),
        }
    }
}

impl ExtractionConfig {
    /// Sets the minimum accepted text length.
    #[must_use]
    pub fn with_min_text_length(mut self, min: usize) -> Self {
        self.min_text_length = min;
        self
    }

    /// Adds a selector to remove.
    #[must_use]
    pub fn with_remove_selector(mut self, selector: impl Into<String>) -> Self {
        self.remove_selectors.push(selector.into());
        self
    }

    /// Adds a main content selector.
    #[must_use]
    pub fn with_content_selector(mut self, selector: impl Into<String>) -> Self {
        self.main_content_selectors.push(selector.into());
        self
    }
}

/// Configuration for an OpenAI-compatible generative summarizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerativeConfig {
    /// Base URL; `/chat/completions` is appended.
    pub endpoint: String,
    /// Model name sent with each request.
    pub model: String,
    /// Bearer token. Never serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Timeout for one summarization call in seconds.
    #[serde(default = "default_generative_timeout")]
    pub timeout_seconds: f64,
    /// Upper bound on generated tokens.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

fn default_generative_timeout() -> f64 {
    15.0
}

fn default_max_output_tokens() -> u32 {
    256
}

impl GenerativeConfig {
    /// Creates a generative config for an endpoint and model.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            timeout_seconds: default_generative_timeout(),
            max_output_tokens: default_max_output_tokens(),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    /// Gets timeout as Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_seconds)
    }
}

/// Configuration for summarization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    /// Documents shorter than this get the placeholder summary.
    #[serde(default = "default_min_content")]
    pub min_content_chars: usize,
    /// Placeholder text for failed or too-short documents.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
    /// Optional generative backend.
    #[serde(default)]
    pub generative: Option<GenerativeConfig>,
}

fn default_min_content() -> usize {
    100
}

fn default_placeholder() -> String {
    INSUFFICIENT_CONTENT.to_string()
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            min_content_chars: default_min_content(),
            placeholder: default_placeholder(),
            generative: None,
        }
    }
}

impl SummarizerConfig {
    /// Enables the generative backend.
    #[must_use]
    pub fn with_generative(mut self, generative: GenerativeConfig) -> Self {
        self.generative = Some(generative);
        self
    }
}

/// Combined configuration for the insight pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum concurrent fetches.
    #[serde(default = "default_concurrent")]
    pub max_concurrent: usize,
    /// Default number of search results.
    #[serde(default = "default_num_results")]
    pub default_num_results: usize,
    /// Default number of keywords per page.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    /// Default number of summary sentences.
    #[serde(default = "default_max_sentences")]
    pub default_max_sentences: usize,
    /// Optional deadline for a whole run in seconds.
    #[serde(default)]
    pub run_timeout_seconds: Option<f64>,
    /// Search configuration.
    #[serde(default)]
    pub search: SearchConfig,
    /// Fetch configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Extraction configuration.
    #[serde(default)]
    pub extraction: ExtractionConfig,
    /// Summarizer configuration.
    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

fn default_concurrent() -> usize {
    4
}

fn default_num_results() -> usize {
    5
}

fn default_top_k() -> usize {
    5
}

fn default_max_sentences() -> usize {
    3
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_concurrent(),
            default_num_results: default_num_results(),
            default_top_k: default_top_k(),
            default_max_sentences: default_max_sentences(),
            run_timeout_seconds: None,
            search: SearchConfig::default(),
            fetch: FetchConfig::default(),
            extraction: ExtractionConfig::default(),
            summarizer: SummarizerConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Creates a new pipeline configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a configuration from defaults overlaid with `INSIGHTFLOW_*`
    /// environment variables.
    pub fn from_env() -> Result<Self, InsightError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, InsightError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = Self::default();
        if let Some(v) = get("INSIGHTFLOW_MAX_CONCURRENT") {
            config.max_concurrent = parse_var("INSIGHTFLOW_MAX_CONCURRENT", &v)?;
        }
        if let Some(v) = get("INSIGHTFLOW_FETCH_TIMEOUT") {
            config.fetch.timeout_seconds = parse_var("INSIGHTFLOW_FETCH_TIMEOUT", &v)?;
        }
        if let Some(v) = get("INSIGHTFLOW_SEARCH_TIMEOUT") {
            config.search.timeout_seconds = parse_var("INSIGHTFLOW_SEARCH_TIMEOUT", &v)?;
        }
        if let Some(v) = get("INSIGHTFLOW_SEARCH_RETRIES") {
            config.search.retry.max_retries = parse_var("INSIGHTFLOW_SEARCH_RETRIES", &v)?;
        }
        if let Some(v) = get("INSIGHTFLOW_SEARCH_ENDPOINT") {
            config.search.endpoint = v;
        }
        if let Some(v) = get("INSIGHTFLOW_RUN_TIMEOUT") {
            config.run_timeout_seconds = Some(parse_var("INSIGHTFLOW_RUN_TIMEOUT", &v)?);
        }
        if let Some(endpoint) = get("INSIGHTFLOW_SUMMARIZER_ENDPOINT") {
            let model = get("INSIGHTFLOW_SUMMARIZER_MODEL").ok_or_else(|| {
                InsightError::Config(
                    "INSIGHTFLOW_SUMMARIZER_MODEL is required when INSIGHTFLOW_SUMMARIZER_ENDPOINT is set"
                        .to_string(),
                )
            })?;
            let mut generative = GenerativeConfig::new(endpoint, model);
            generative.api_key = get("INSIGHTFLOW_SUMMARIZER_API_KEY");
            config.summarizer.generative = Some(generative);
        }

        config.validate()?;
        Ok(config)
    }

    /// Sets the maximum concurrent fetches.
    #[must_use]
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the run deadline.
    #[must_use]
    pub fn with_run_timeout(mut self, seconds: f64) -> Self {
        self.run_timeout_seconds = Some(seconds);
        self
    }

    /// Sets the search configuration.
    #[must_use]
    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Sets the fetch configuration.
    #[must_use]
    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    /// Sets the extraction configuration.
    #[must_use]
    pub fn with_extraction(mut self, extraction: ExtractionConfig) -> Self {
        self.extraction = extraction;
        self
    }

    /// Sets the summarizer configuration.
    #[must_use]
    pub fn with_summarizer(mut self, summarizer: SummarizerConfig) -> Self {
        self.summarizer = summarizer;
        self
    }

    /// Gets the run deadline as Duration.
    #[must_use]
    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_seconds.map(Duration::from_secs_f64)
    }

    /// Rejects configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), InsightError> {
        if self.max_concurrent == 0 {
            return Err(InsightError::Config("max_concurrent must be at least 1".into()));
        }
        if self.search.max_results == 0 {
            return Err(InsightError::Config("search.max_results must be at least 1".into()));
        }
        if self.extraction.max_chars == 0 {
            return Err(InsightError::Config("extraction.max_chars must be at least 1".into()));
        }
        check_positive("search.timeout_seconds", self.search.timeout_seconds)?;
        self.search.retry.validate()?;
        check_positive("fetch.timeout_seconds", self.fetch.timeout_seconds)?;
        check_positive("fetch.connect_timeout_seconds", self.fetch.connect_timeout_seconds)?;
        if let Some(t) = self.run_timeout_seconds {
            check_positive("run_timeout_seconds", t)?;
        }
        if let Some(ref g) = self.summarizer.generative {
            check_positive("summarizer.generative.timeout_seconds", g.timeout_seconds)?;
        }
        if self.summarizer.placeholder.trim().is_empty() {
            return Err(InsightError::Config("summarizer.placeholder must not be empty".into()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, InsightError> {
    value
        .parse::<T>()
        .map_err(|_| InsightError::Config(format!("{key}: cannot parse '{value}'")))
}

fn check_positive(name: &str, value: f64) -> Result<(), InsightError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(InsightError::Config(format!("{name} must be a positive number")))
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<(), InsightError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(InsightError::Config(format!("{name} must be a non-negative number")))
    }
}
