//! DuckDuckGo HTML search client.

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use std::time::Instant;
use tracing::debug;

use super::provider::SearchProvider;
use crate::config::SearchConfig;
use crate::errors::InsightError;

static RESULT_LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a.result__a").expect("result selector is valid"));

/// Searches through the DuckDuckGo HTML endpoint, which needs no API key.
#[derive(Debug, Clone)]
pub struct DuckDuckGoProvider {
    http_client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGoProvider {
    /// Creates a provider from the search configuration.
    pub fn new(config: &SearchConfig) -> Result<Self, InsightError> {
        let http_client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http_client,
            endpoint: config.endpoint.clone(),
        })
    }

    /// The endpoint queries are posted to.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, InsightError> {
        let start = Instant::now();
        let response = self
            .http_client
            .post(&self.endpoint)
            .form(&[("q", query)])
            .header("Accept", "text/html")
            .send()
            .await
            .map_err(|e| InsightError::SearchUnavailable(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(InsightError::SearchUnavailable(format!(
                "search endpoint returned {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| InsightError::SearchUnavailable(format!("failed to read body: {e}")))?;

        let urls = parse_results(&body, max_results);
        debug!(
            results = urls.len(),
            duration_ms = start.elapsed().as_millis(),
            "DuckDuckGo search complete"
        );
        Ok(urls)
    }
}

/// Extracts result URLs from a DuckDuckGo HTML results page, in page order.
///
/// Redirect links are unwrapped; anything that is not an absolute http(s)
/// URL after unwrapping is skipped.
#[must_use]
pub fn parse_results(html: &str, max_results: usize) -> Vec<String> {
    let doc = Html::parse_document(html);
    doc.select(&RESULT_LINK)
        .filter_map(|a| a.value().attr("href"))
        .map(unwrap_redirect)
        .filter(|href| href.starts_with("http://") || href.starts_with("https://"))
        .take(max_results)
        .collect()
}

/// Result links often look like `//duckduckgo.com/l/?uddg=https%3A%2F%2F...&rut=...`;
/// the destination is the percent-decoded `uddg` parameter.
fn unwrap_redirect(href: &str) -> String {
    if let Some(pos) = href.find("uddg=") {
        let start = pos + "uddg=".len();
        let end = href[start..].find('&').map_or(href.len(), |i| start + i);
        let encoded = &href[start..end];
        if !encoded.is_empty() {
            return percent_decode_str(encoded).decode_utf8_lossy().into_owned();
        }
    }
    href.to_string()
}
