//! Deterministic doubles for the pipeline's external boundaries.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::InsightError;
use crate::fetch::{FetchResult, Fetcher};
use crate::models::SearchResultUrl;
use crate::observability::FetchObserver;
use crate::search::SearchProvider;
use crate::summarize::GenerativeSummarizer;

/// A search provider that returns a fixed list of URLs.
///
/// The list is returned as is, duplicates and invalid entries included, so
/// dispatcher normalization can be exercised.
#[derive(Debug, Default)]
pub struct StaticSearchProvider {
    urls: Vec<String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticSearchProvider {
    /// Creates a provider returning `urls`.
    #[must_use]
    pub fn new<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Delays every response.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the number of times the provider was called.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for StaticSearchProvider {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<String>, InsightError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.urls.clone())
    }
}

/// A search provider that always fails.
#[derive(Debug)]
pub struct FailingSearchProvider {
    message: String,
}

impl FailingSearchProvider {
    /// Creates a provider failing with `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for FailingSearchProvider {
    async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<String>, InsightError> {
        Err(InsightError::SearchUnavailable(self.message.clone()))
    }
}

#[derive(Debug, Clone)]
enum StubReply {
    Page {
        status: u16,
        content_type: Option<String>,
        body: String,
    },
    Failure(String),
}

/// A fetcher with canned per-URL responses, failures and delays.
///
/// Unknown URLs answer with status 404. Tracks requested URLs and the peak
/// number of concurrent fetches.
#[derive(Debug, Default)]
pub struct StubFetcher {
    replies: HashMap<String, StubReply>,
    delays: HashMap<String, Duration>,
    requested: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn key(url: &str) -> String {
    SearchResultUrl::parse(url).map_or_else(|_| url.to_string(), |u| u.as_str().to_string())
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StubFetcher {
    /// Creates a fetcher with no canned responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves an HTML page with status 200.
    #[must_use]
    pub fn with_html(self, url: &str, html: impl Into<String>) -> Self {
        self.with_response(url, 200, Some("text/html; charset=utf-8"), html)
    }

    /// Serves an arbitrary response.
    #[must_use]
    pub fn with_response(
        mut self,
        url: &str,
        status: u16,
        content_type: Option<&str>,
        body: impl Into<String>,
    ) -> Self {
        self.replies.insert(
            key(url),
            StubReply::Page {
                status,
                content_type: content_type.map(String::from),
                body: body.into(),
            },
        );
        self
    }

    /// Serves an empty HTML response with `status`.
    #[must_use]
    pub fn with_status(self, url: &str, status: u16) -> Self {
        self.with_response(url, status, Some("text/html"), "")
    }

    /// Fails the fetch with a classified reason such as `"timeout"`.
    #[must_use]
    pub fn with_failure(mut self, url: &str, reason: impl Into<String>) -> Self {
        self.replies.insert(key(url), StubReply::Failure(reason.into()));
        self
    }

    /// Delays the response for `url`.
    #[must_use]
    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(key(url), delay);
        self
    }

    /// URLs fetched so far, in call order.
    #[must_use]
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }

    /// The largest number of fetches that were in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResult, InsightError> {
        let url_key = key(url);
        self.requested.lock().push(url_key.clone());
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        if let Some(delay) = self.delays.get(&url_key) {
            tokio::time::sleep(*delay).await;
        }

        match self.replies.get(&url_key).cloned() {
            Some(StubReply::Failure(reason)) => Err(InsightError::fetch_failed(url, reason)),
            Some(StubReply::Page {
                status,
                content_type,
                body,
            }) => Ok(FetchResult {
                status_code: status,
                headers: HashMap::new(),
                text: body,
                final_url: url.to_string(),
                content_type,
                duration_ms: 0.0,
            }),
            None => Ok(FetchResult {
                status_code: 404,
                headers: HashMap::new(),
                text: String::new(),
                final_url: url.to_string(),
                content_type: Some("text/html".to_string()),
                duration_ms: 0.0,
            }),
        }
    }
}

/// A generative summarizer that always returns the same text.
#[derive(Debug, Clone)]
pub struct StaticGenerator {
    text: String,
}

impl StaticGenerator {
    /// Creates a generator returning `text`.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl GenerativeSummarizer for StaticGenerator {
    fn name(&self) -> &str {
        "static"
    }

    async fn generate(&self, _text: &str, _max_sentences: usize) -> Result<String, InsightError> {
        Ok(self.text.clone())
    }
}

/// A generative summarizer that always fails.
#[derive(Debug, Clone, Default)]
pub struct FailingGenerator;

#[async_trait]
impl GenerativeSummarizer for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    async fn generate(&self, _text: &str, _max_sentences: usize) -> Result<String, InsightError> {
        Err(InsightError::SummarizationDegraded("model unavailable".into()))
    }
}

/// A generative summarizer that sleeps before answering.
#[derive(Debug, Clone)]
pub struct SlowGenerator {
    delay: Duration,
}

impl SlowGenerator {
    /// Creates a generator that takes `delay` to answer.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl GenerativeSummarizer for SlowGenerator {
    fn name(&self) -> &str {
        "slow"
    }

    async fn generate(&self, _text: &str, _max_sentences: usize) -> Result<String, InsightError> {
        tokio::time::sleep(self.delay).await;
        Ok("too late".to_string())
    }
}

/// A fetch observer that records events as short strings.
#[derive(Debug, Default)]
pub struct RecordingFetchObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingFetchObserver {
    /// Recorded events in order.
    #[must_use]
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl FetchObserver for RecordingFetchObserver {
    fn on_fetch_start(&self, url: &str, _request_id: &str) {
        self.events.lock().push(format!("start {url}"));
    }

    fn on_fetch_complete(&self, url: &str, _request_id: &str, _duration_ms: f64, status_code: u16) {
        self.events.lock().push(format!("complete {url} {status_code}"));
    }

    fn on_fetch_error(&self, url: &str, _request_id: &str, error: &str) {
        self.events.lock().push(format!("error {url} {error}"));
    }

    fn on_extract_complete(&self, url: &str, _request_id: &str, _duration_ms: f64, text_len: usize) {
        self.events.lock().push(format!("extract {url} {text_len}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_counts_calls() {
        let provider = StaticSearchProvider::new(["https://a.example/"]);
        let urls = provider.search("q", 5).await.unwrap();
        assert_eq!(urls, vec!["https://a.example/".to_string()]);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_stub_fetcher_defaults_to_404() {
        let fetcher = StubFetcher::new();
        let result = fetcher.fetch("https://unknown.example/").await.unwrap();
        assert_eq!(result.status_code, 404);
        assert_eq!(fetcher.requested(), vec!["https://unknown.example/".to_string()]);
    }

    #[tokio::test]
    async fn test_stub_fetcher_normalizes_keys() {
        let fetcher = StubFetcher::new().with_html("https://A.example", "<p>x</p>");
        let result = fetcher.fetch("https://a.example/").await.unwrap();
        assert_eq!(result.status_code, 200);
        assert_eq!(fetcher.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_stub_fetcher_failure() {
        let fetcher = StubFetcher::new().with_failure("https://a.example/", "timeout");
        let err = fetcher.fetch("https://a.example/").await.unwrap_err();
        assert_eq!(err.code(), "fetch_failed");
    }
}
