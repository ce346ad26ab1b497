//! The search provider boundary.

use async_trait::async_trait;

use crate::errors::InsightError;

/// An external web search service.
///
/// Implementations return candidate URLs in provider order. They are called
/// once per run (plus configured retries) and must not be assumed reliable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Returns up to `max_results` raw result URLs for `query`.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<String>, InsightError>;
}
