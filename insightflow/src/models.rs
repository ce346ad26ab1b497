//! Data model for a single query-to-insight run.
//!
//! Everything here is created and dropped within one pipeline invocation.
//! Values are immutable once built; the report is assembled exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use url::Url;
use uuid::Uuid;

use crate::errors::InsightError;

/// Reason recorded for URLs that did not finish before cancellation.
pub const CANCELLED_REASON: &str = "cancelled";

/// A non-empty, trimmed text query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query(String);

impl Query {
    /// Creates a query, rejecting empty or whitespace-only text.
    pub fn new(text: impl AsRef<str>) -> Result<Self, InsightError> {
        let trimmed = text.as_ref().trim();
        if trimmed.is_empty() {
            return Err(InsightError::invalid_input("query must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the query text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A normalized absolute http(s) URL returned by the search provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchResultUrl(Url);

impl SearchResultUrl {
    /// Parses and normalizes a URL. Fragments are dropped.
    pub fn parse(raw: &str) -> Result<Self, InsightError> {
        let mut url = Url::parse(raw.trim())
            .map_err(|e| InsightError::invalid_input(format!("invalid url '{raw}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(InsightError::invalid_input(format!(
                "unsupported url scheme '{}'",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(InsightError::invalid_input(format!("url '{raw}' has no host")));
        }
        url.set_fragment(None);
        Ok(Self(url))
    }

    /// Returns the URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Returns the parsed URL.
    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &str {
        self.0.host_str().unwrap_or_default()
    }
}

impl fmt::Display for SearchResultUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// The tagged result of fetching and parsing one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// Readable text was extracted.
    Content {
        /// Extracted text, capped but not yet normalized.
        text: String,
        /// Content type reported by the server.
        content_type: String,
    },
    /// The URL could not be fetched or parsed.
    Failed {
        /// Classified failure reason.
        reason: String,
    },
}

impl FetchOutcome {
    /// Creates a content outcome.
    #[must_use]
    pub fn content(text: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self::Content {
            text: text.into(),
            content_type: content_type.into(),
        }
    }

    /// Creates a failed outcome.
    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Creates the outcome for a URL abandoned by cancellation.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::failed(CANCELLED_REASON)
    }

    /// Whether content was extracted.
    #[must_use]
    pub fn is_content(&self) -> bool {
        matches!(self, Self::Content { .. })
    }

    /// Returns the failure reason, if failed.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failed { reason } => Some(reason),
            Self::Content { .. } => None,
        }
    }
}

/// Plain text with collapsed whitespace, capped at the extraction budget.
///
/// Invariant: no two consecutive spaces and no two consecutive newlines, no
/// leading or trailing whitespace. Built by [`crate::normalize::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedDocument(String);

impl NormalizedDocument {
    pub(crate) fn from_normalized(text: String) -> Self {
        Self(text)
    }

    /// Returns the text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters.
    #[must_use]
    pub fn char_count(&self) -> usize {
        self.0.chars().count()
    }

    /// Whether the document has no text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Up to `top_k` distinct single-word terms, most relevant first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordSet(Vec<String>);

impl KeywordSet {
    /// An empty keyword set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a keyword set from terms in rank order, dropping
    /// case-insensitive duplicates and keeping at most `top_k`.
    #[must_use]
    pub fn from_ranked<I, S>(terms: I, top_k: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let keywords = terms
            .into_iter()
            .map(Into::into)
            .filter(|term: &String| !term.is_empty() && seen.insert(term.to_lowercase()))
            .take(top_k)
            .collect();
        Self(keywords)
    }

    /// Returns the terms.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Number of terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the terms.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// How a summary was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    /// The document was short enough to return as is.
    Verbatim,
    /// Leading sentences of the document.
    Extractive,
    /// Text returned by the generative summarizer.
    Generated,
    /// Placeholder for failed or too-short documents.
    Placeholder,
}

impl fmt::Display for SummaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Verbatim => write!(f, "verbatim"),
            Self::Extractive => write!(f, "extractive"),
            Self::Generated => write!(f, "generated"),
            Self::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// A short digest of a document. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    text: String,
    kind: SummaryKind,
}

impl Summary {
    /// Creates a summary. Callers guarantee `text` is non-empty.
    pub(crate) fn new(text: impl Into<String>, kind: SummaryKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    /// Creates a placeholder summary.
    #[must_use]
    pub fn placeholder(text: impl Into<String>) -> Self {
        let text = text.into();
        let text = if text.trim().is_empty() {
            crate::config::INSUFFICIENT_CONTENT.to_string()
        } else {
            text
        };
        Self::new(text, SummaryKind::Placeholder)
    }

    /// Returns the summary text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns how the summary was produced.
    #[must_use]
    pub fn kind(&self) -> SummaryKind {
        self.kind
    }

    /// Whether this is a placeholder.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.kind == SummaryKind::Placeholder
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Summary and keywords for one requested URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageInsight {
    /// The URL as returned by the dispatcher.
    pub url: SearchResultUrl,
    /// The page summary.
    pub summary: Summary,
    /// The page keywords.
    pub keywords: KeywordSet,
    /// Failure reason if the page could not be fetched or parsed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageInsight {
    /// Creates an insight for a successfully processed page.
    #[must_use]
    pub fn new(url: SearchResultUrl, summary: Summary, keywords: KeywordSet) -> Self {
        Self {
            url,
            summary,
            keywords,
            error: None,
        }
    }

    /// Creates an insight for a page that failed, with a placeholder summary
    /// and no keywords.
    #[must_use]
    pub fn failed(
        url: SearchResultUrl,
        reason: impl Into<String>,
        placeholder: impl Into<String>,
    ) -> Self {
        Self {
            url,
            summary: Summary::placeholder(placeholder),
            keywords: KeywordSet::empty(),
            error: Some(reason.into()),
        }
    }

    /// Whether the page was processed successfully.
    #[must_use]
    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    /// Whether the page was abandoned by cancellation.
    #[must_use]
    pub fn was_cancelled(&self) -> bool {
        self.error.as_deref() == Some(CANCELLED_REASON)
    }

    /// Converts to dictionary.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut dict = HashMap::new();
        dict.insert("url".to_string(), serde_json::json!(self.url.as_str()));
        dict.insert("summary".to_string(), serde_json::json!(self.summary.text()));
        dict.insert("keywords".to_string(), serde_json::json!(self.keywords.as_slice()));
        if let Some(ref error) = self.error {
            dict.insert("error".to_string(), serde_json::json!(error));
        }
        dict
    }
}

/// Counters for one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Pages with extracted content.
    pub fetched: usize,
    /// Pages that failed for reasons other than cancellation.
    pub failed: usize,
    /// Pages abandoned by cancellation.
    pub cancelled: usize,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: f64,
}

/// The terminal artifact of one run: one insight per dispatched URL, in
/// dispatcher order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    run_id: Uuid,
    query: Query,
    results: Vec<PageInsight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    search_error: Option<String>,
    stats: RunStats,
    created_at: DateTime<Utc>,
}

impl SearchReport {
    /// Assembles a report. Insights must already be in dispatcher order.
    pub(crate) fn assemble(
        run_id: Uuid,
        query: Query,
        results: Vec<PageInsight>,
        search_error: Option<String>,
        duration_ms: f64,
    ) -> Self {
        let cancelled = results.iter().filter(|r| r.was_cancelled()).count();
        let fetched = results.iter().filter(|r| r.success()).count();
        let stats = RunStats {
            fetched,
            failed: results.len() - fetched - cancelled,
            cancelled,
            duration_ms,
        };
        Self {
            run_id,
            query,
            results,
            search_error,
            stats,
            created_at: Utc::now(),
        }
    }

    /// The run identifier.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// The query this report answers.
    #[must_use]
    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Insights in dispatcher order.
    #[must_use]
    pub fn results(&self) -> &[PageInsight] {
        &self.results
    }

    /// Why the search provider returned nothing, if it failed.
    #[must_use]
    pub fn search_error(&self) -> Option<&str> {
        self.search_error.as_deref()
    }

    /// Run counters.
    #[must_use]
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// When the report was assembled.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of insights.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the report has no insights.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Converts to the `{query, results: [{url, summary, keywords}]}` shape.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut dict = HashMap::new();
        dict.insert("query".to_string(), serde_json::json!(self.query.as_str()));
        dict.insert(
            "results".to_string(),
            serde_json::json!(self.results.iter().map(PageInsight::to_dict).collect::<Vec<_>>()),
        );
        if let Some(ref error) = self.search_error {
            dict.insert("search_error".to_string(), serde_json::json!(error));
        }
        dict
    }

    /// Renders a human-readable listing of the results.
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        if let Some(ref error) = self.search_error {
            out.push_str(&format!("Search unavailable: {error}\n"));
        }
        if self.results.is_empty() {
            out.push_str(&format!("No results for: {}\n", self.query));
            return out;
        }
        for (idx, insight) in self.results.iter().enumerate() {
            out.push_str(&format!("\nResult {}: {}\n", idx + 1, insight.url));
            out.push_str(&format!("Summary: {}\n", insight.summary));
            let keywords: Vec<&str> = insight.keywords.iter().collect();
            out.push_str(&format!("Keywords: {}\n", keywords.join(", ")));
            if let Some(ref error) = insight.error {
                out.push_str(&format!("Error: {error}\n"));
            }
        }
        out
    }
}

/// Parameters of one `run_search` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Raw query text.
    pub query: String,
    /// Number of URLs to request from the provider.
    pub num_results: usize,
    /// Keywords per page.
    pub top_k: usize,
    /// Sentences per extractive summary.
    pub max_sentences: usize,
}

impl SearchRequest {
    /// Creates a request with default counts (5 results, 5 keywords, 3 sentences).
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            num_results: 5,
            top_k: 5,
            max_sentences: 3,
        }
    }

    /// Sets the number of results.
    #[must_use]
    pub fn with_num_results(mut self, n: usize) -> Self {
        self.num_results = n;
        self
    }

    /// Sets the number of keywords.
    #[must_use]
    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// Sets the number of summary sentences.
    #[must_use]
    pub fn with_max_sentences(mut self, n: usize) -> Self {
        self.max_sentences = n;
        self
    }

    /// Validates counts and returns the parsed query.
    pub fn validate(&self, max_results: usize) -> Result<Query, InsightError> {
        let query = Query::new(&self.query)?;
        if self.num_results == 0 || self.num_results > max_results {
            return Err(InsightError::invalid_input(format!(
                "num_results must be between 1 and {max_results}, got {}",
                self.num_results
            )));
        }
        if self.top_k == 0 {
            return Err(InsightError::invalid_input("top_k must be at least 1"));
        }
        if self.max_sentences == 0 {
            return Err(InsightError::invalid_input("max_sentences must be at least 1"));
        }
        Ok(query)
    }
}
