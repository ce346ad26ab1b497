//! Query-to-insight orchestration.
//!
//! One [`InsightPipeline`] is built at startup and shared by every run. A run
//! flows through four stages:
//!
//! 1. the [`SearchDispatcher`] turns the query into ordered, deduplicated URLs
//! 2. the [`WorkerPool`] fetches and parses them with bounded concurrency
//! 3. each page is normalized, then ranked for keywords and summarized
//! 4. the results are assembled into a [`SearchReport`] in dispatcher order
//!
//! Per-URL failures never abort a run. Cancellation and the optional run
//! deadline stop outstanding work and mark the unfinished URLs as cancelled.


use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::config::PipelineConfig;
use crate::errors::InsightError;
use crate::fetch::{fetch_and_parse, ContentExtractor, Fetcher, HttpFetcher, ReadableContentExtractor, WorkerPool};
use crate::keywords::KeywordExtractor;
use crate::models::{FetchOutcome, PageInsight, Query, SearchReport, SearchRequest, SearchResultUrl, CANCELLED_REASON};
use crate::normalize::normalize_capped;
use crate::observability::{FetchObserver, NoOpFetchObserver, TracingFetchObserver};
use crate::search::{Dispatch, DuckDuckGoProvider, SearchDispatcher, SearchProvider};
use crate::summarize::Summarizer;

/// Per-page work shared by every worker of a run.
#[derive(Clone)]
struct PageAnalyzer {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn ContentExtractor>,
    observer: Arc<dyn FetchObserver>,
    keywords: KeywordExtractor,
    summarizer: Arc<Summarizer>,
}

impl PageAnalyzer {
    async fn analyze(&self, url: SearchResultUrl, top_k: usize, max_sentences: usize) -> PageInsight {
        let outcome = fetch_and_parse(
            self.fetcher.as_ref(),
            self.extractor.as_ref(),
            self.observer.as_ref(),
            &url,
        )
        .await;

        match outcome {
            FetchOutcome::Content { text, .. } => {
                let doc = normalize_capped(&text, self.extractor.config().max_chars);
                let keywords = self.keywords.extract(&doc, top_k);
                let summary = self.summarizer.summarize(&doc, max_sentences).await;
                PageInsight::new(url, summary, keywords)
            }
            FetchOutcome::Failed { reason } => {
                let err = InsightError::fetch_failed(url.as_str(), reason.as_str());
                warn!(url = %url, code = err.code(), reason = %reason, "Page skipped");
                PageInsight::failed(url, reason, self.summarizer.placeholder())
            }
        }
    }
}

/// Runs queries end to end.
///
/// Cheap to share behind an `Arc`; concurrent runs do not interfere with
/// each other.
pub struct InsightPipeline {
    config: Arc<PipelineConfig>,
    dispatcher: SearchDispatcher,
    pool: WorkerPool,
    analyzer: PageAnalyzer,
}

impl std::fmt::Debug for InsightPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightPipeline")
            .field("max_concurrent", &self.pool.max_concurrent())
            .field("search", self.dispatcher.config())
            .field("summarizer", &self.analyzer.summarizer)
            .finish_non_exhaustive()
    }
}

impl InsightPipeline {
    /// Creates a pipeline around an explicit search provider and fetcher.
    ///
    /// Extraction and summarization are built from `config`; fetch events go
    /// nowhere until an observer is attached.
    pub fn new(
        config: PipelineConfig,
        provider: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Result<Self, InsightError> {
        config.validate()?;
        let extractor = ReadableContentExtractor::new(config.extraction.clone())?;
        let summarizer = Summarizer::from_config(config.summarizer.clone())?;
        Ok(Self {
            dispatcher: SearchDispatcher::new(provider, config.search.clone()),
            pool: WorkerPool::new(config.max_concurrent),
            analyzer: PageAnalyzer {
                fetcher,
                extractor: Arc::new(extractor),
                observer: Arc::new(NoOpFetchObserver),
                keywords: KeywordExtractor::new(),
                summarizer: Arc::new(summarizer),
            },
            config: Arc::new(config),
        })
    }

    /// Creates a production pipeline: DuckDuckGo search, `reqwest` fetching
    /// and `tracing` fetch events.
    pub fn from_config(config: PipelineConfig) -> Result<Self, InsightError> {
        let provider = DuckDuckGoProvider::new(&config.search)?;
        let fetcher = HttpFetcher::new(config.fetch.clone())?;
        Ok(Self::new(config, Arc::new(provider), Arc::new(fetcher))?
            .with_observer(Arc::new(TracingFetchObserver)))
    }

    /// Replaces the content extractor.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn ContentExtractor>) -> Self {
        self.analyzer.extractor = extractor;
        self
    }

    /// Replaces the summarizer.
    #[must_use]
    pub fn with_summarizer(mut self, summarizer: Summarizer) -> Self {
        self.analyzer.summarizer = Arc::new(summarizer);
        self
    }

    /// Attaches a fetch observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn FetchObserver>) -> Self {
        self.analyzer.observer = observer;
        self
    }

    /// Replaces the keyword extractor.
    #[must_use]
    pub fn with_keyword_extractor(mut self, keywords: KeywordExtractor) -> Self {
        self.analyzer.keywords = keywords;
        self
    }

    /// Gets the configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// A request for `query` using the configured default counts.
    #[must_use]
    pub fn request(&self, query: impl Into<String>) -> SearchRequest {
        SearchRequest::new(query)
            .with_num_results(self.config.default_num_results)
            .with_top_k(self.config.default_top_k)
            .with_max_sentences(self.config.default_max_sentences)
    }

    /// Searches, fetches, summarizes and ranks keywords for one query.
    ///
    /// Fails only on invalid input. A failing search provider yields an
    /// empty report with `search_error` set, and failing pages yield
    /// placeholder entries.
    pub async fn run_search(
        &self,
        query: &str,
        num_results: usize,
        top_k: usize,
        max_sentences: usize,
    ) -> Result<SearchReport, InsightError> {
        let request = SearchRequest::new(query)
            .with_num_results(num_results)
            .with_top_k(top_k)
            .with_max_sentences(max_sentences);
        self.run_request(&request).await
    }

    /// Runs a request under the configured run deadline, if any.
    pub async fn run_request(&self, request: &SearchRequest) -> Result<SearchReport, InsightError> {
        self.run_search_with(request, &CancellationToken::new(), self.config.run_timeout())
            .await
    }

    /// Runs a request that stops early when `cancel` fires or `timeout`
    /// elapses.
    ///
    /// Pages that finished before the stop keep their results; the rest are
    /// reported with error `"cancelled"`. The report always has one entry
    /// per dispatched URL.
    pub async fn run_search_with(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<SearchReport, InsightError> {
        let query = request.validate(self.config.search.max_results)?;
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("search_run", run_id = %run_id, query = %query);
        self.execute(run_id, query, request, cancel, timeout)
            .instrument(span)
            .await
    }

    async fn execute(
        &self,
        run_id: Uuid,
        query: Query,
        request: &SearchRequest,
        cancel: &CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<SearchReport, InsightError> {
        let start = Instant::now();
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        info!(num_results = request.num_results, "Search run started");

        let dispatch = tokio::select! {
            biased;
            () = cancel.cancelled() => Dispatch::unavailable(CANCELLED_REASON),
            () = expire(deadline) => Dispatch::unavailable(CANCELLED_REASON),
            dispatched = self.dispatcher.dispatch(&query, request.num_results) => dispatched?,
        };

        let (top_k, max_sentences) = (request.top_k, request.max_sentences);
        let run = self
            .pool
            .process(&dispatch.urls, cancel, deadline, |url| {
                let analyzer = self.analyzer.clone();
                async move { analyzer.analyze(url, top_k, max_sentences).await }
            })
            .await;

        if run.interrupted {
            let err = InsightError::Cancelled(cancel.reason().unwrap_or_else(|| "deadline".to_string()));
            info!(
                code = err.code(),
                error = %err,
                cancelled = run.progress.cancelled_count,
                "Search run interrupted"
            );
        }

        let placeholder = self.analyzer.summarizer.placeholder();
        let results: Vec<PageInsight> = dispatch
            .urls
            .into_iter()
            .zip(run.slots)
            .map(|(url, slot)| {
                slot.unwrap_or_else(|reason| PageInsight::failed(url, reason, placeholder))
            })
            .collect();

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let report = SearchReport::assemble(run_id, query, results, dispatch.unavailable, duration_ms);
        info!(
            results = report.len(),
            fetched = report.stats().fetched,
            failed = report.stats().failed,
            cancelled = report.stats().cancelled,
            duration_ms,
            "Search run complete"
        );
        Ok(report)
    }
}

async fn expire(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
