//! Search dispatch with timeout, bounded retry and URL normalization.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::provider::SearchProvider;
use crate::config::SearchConfig;
use crate::errors::InsightError;
use crate::models::{Query, SearchResultUrl};

/// The outcome of one dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dispatch {
    /// Deduplicated URLs in provider order.
    pub urls: Vec<SearchResultUrl>,
    /// Why the provider returned nothing, if it failed.
    pub unavailable: Option<String>,
}

impl Dispatch {
    /// A dispatch that produced URLs.
    #[must_use]
    pub fn found(urls: Vec<SearchResultUrl>) -> Self {
        Self {
            urls,
            unavailable: None,
        }
    }

    /// A dispatch whose provider failed.
    #[must_use]
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            urls: Vec::new(),
            unavailable: Some(reason.into()),
        }
    }

    /// Whether the provider failed.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.unavailable.is_some()
    }

    /// Number of URLs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Whether no URLs were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Parses raw provider URLs, drops invalid ones and duplicates, and keeps
/// the first `cap` in order.
#[must_use]
pub fn dedup_urls<I, S>(raw: I, cap: usize) -> Vec<SearchResultUrl>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|candidate| match SearchResultUrl::parse(candidate.as_ref()) {
            Ok(url) => Some(url),
            Err(e) => {
                debug!(url = candidate.as_ref(), error = %e, "Dropping provider url");
                None
            }
        })
        .filter(|url| seen.insert(url.as_str().to_string()))
        .take(cap)
        .collect()
}

/// Issues the query against the search provider.
///
/// The provider is the only component in the pipeline that is retried, and
/// only when the retry policy allows it.
#[derive(Clone)]
pub struct SearchDispatcher {
    provider: Arc<dyn SearchProvider>,
    config: SearchConfig,
}

impl std::fmt::Debug for SearchDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchDispatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SearchDispatcher {
    /// Creates a dispatcher around a provider.
    #[must_use]
    pub fn new(provider: Arc<dyn SearchProvider>, config: SearchConfig) -> Self {
        Self { provider, config }
    }

    /// Gets the configuration.
    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Returns up to `num_results` deduplicated URLs for `query`.
    ///
    /// Provider failures and timeouts never surface as errors: they yield a
    /// [`Dispatch`] with no URLs and the failure reason. Only an out-of-range
    /// `num_results` is rejected.
    pub async fn dispatch(&self, query: &Query, num_results: usize) -> Result<Dispatch, InsightError> {
        if num_results == 0 || num_results > self.config.max_results {
            return Err(InsightError::invalid_input(format!(
                "num_results must be between 1 and {}, got {num_results}",
                self.config.max_results
            )));
        }

        let start = Instant::now();
        let retry = &self.config.retry;
        let mut last_error = String::new();

        for attempt in 0..=retry.max_retries {
            if attempt > 0 {
                let delay = retry.delay_for_attempt(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis(), "Retrying search provider");
                tokio::time::sleep(delay).await;
            }

            match tokio::time::timeout(
                self.config.timeout(),
                self.provider.search(query.as_str(), num_results),
            )
            .await
            {
                Ok(Ok(raw)) => {
                    let urls = dedup_urls(&raw, num_results);
                    info!(
                        query = %query,
                        returned = raw.len(),
                        kept = urls.len(),
                        duration_ms = start.elapsed().as_millis(),
                        "Search dispatched"
                    );
                    return Ok(Dispatch::found(urls));
                }
                Ok(Err(e)) => {
                    last_error = match e {
                        InsightError::SearchUnavailable(reason) => reason,
                        other => other.to_string(),
                    };
                }
                Err(_) => {
                    last_error = format!("timed out after {:?}", self.config.timeout());
                }
            }
        }

        let err = InsightError::SearchUnavailable(last_error.clone());
        warn!(
            query = %query,
            attempts = retry.max_retries + 1,
            code = err.code(),
            error = %err,
            "Search provider unavailable"
        );
        Ok(Dispatch::unavailable(last_error))
    }
}
