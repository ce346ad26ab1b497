//! Bounded concurrent fetch/parse with ordered, cancellable collection.

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::extractor::ContentExtractor;
use super::fetcher::Fetcher;
use crate::cancellation::CancellationToken;
use crate::errors::InsightError;
use crate::models::{FetchOutcome, PageInsight, SearchResultUrl, CANCELLED_REASON};
use crate::observability::FetchObserver;

/// Reason recorded for a job that panicked.
pub const WORKER_PANICKED: &str = "internal error: worker panicked";

/// Progress information for fetch operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchProgress {
    /// Number of completed fetches.
    pub completed: usize,
    /// Total number of fetches.
    pub total: usize,
    /// Most recently completed URL.
    pub current_url: Option<String>,
    /// Number of successful fetches.
    pub success_count: usize,
    /// Number of failed fetches.
    pub error_count: usize,
    /// Number of URLs abandoned by cancellation.
    pub cancelled_count: usize,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: f64,
}

impl FetchProgress {
    /// Creates new progress tracker.
    #[must_use]
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Default::default()
        }
    }

    /// Returns the completion percentage.
    #[must_use]
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.completed as f64 / self.total as f64) * 100.0
        }
    }

    /// Updates progress with a successful fetch.
    pub fn record_success(&mut self, url: &str, elapsed_ms: f64) {
        self.completed += 1;
        self.success_count += 1;
        self.current_url = Some(url.to_string());
        self.elapsed_ms = elapsed_ms;
    }

    /// Updates progress with a failed fetch.
    pub fn record_error(&mut self, url: &str, elapsed_ms: f64) {
        self.completed += 1;
        self.error_count += 1;
        self.current_url = Some(url.to_string());
        self.elapsed_ms = elapsed_ms;
    }

    /// Counts URLs that never finished.
    pub fn record_cancelled(&mut self, count: usize) {
        self.cancelled_count += count;
    }
}

/// A job result the pool can tally as success or failure.
pub trait WorkOutcome {
    /// Whether the job produced usable content.
    fn succeeded(&self) -> bool;
}

impl WorkOutcome for FetchOutcome {
    fn succeeded(&self) -> bool {
        self.is_content()
    }
}

impl WorkOutcome for PageInsight {
    fn succeeded(&self) -> bool {
        self.success()
    }
}

/// What the pool produced for a batch.
#[derive(Debug)]
pub struct PoolRun<T> {
    /// One slot per input URL, in input order. `Err` holds why the job did
    /// not finish: [`CANCELLED_REASON`] or [`WORKER_PANICKED`].
    pub slots: Vec<Result<T, String>>,
    /// Final progress counters.
    pub progress: FetchProgress,
    /// Whether cancellation or the deadline cut the batch short.
    pub interrupted: bool,
}

/// Runs per-URL jobs with at most `max_concurrent` in flight.
///
/// Results are collected by input index, so output order never depends on
/// completion order. On cancellation or deadline, in-flight jobs are aborted,
/// jobs that already finished are kept, and the rest are reported as
/// cancelled.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    max_concurrent: usize,
}

impl WorkerPool {
    /// Creates a pool. A limit of zero is treated as one.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// The in-flight limit.
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Runs `job` for every URL and collects the results in input order.
    pub async fn process<T, F, Fut>(
        &self,
        urls: &[SearchResultUrl],
        cancel: &CancellationToken,
        deadline: Option<tokio::time::Instant>,
        job: F,
    ) -> PoolRun<T>
    where
        T: WorkOutcome + Send + 'static,
        F: Fn(SearchResultUrl) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let start = Instant::now();
        let mut progress = FetchProgress::new(urls.len());
        let mut slots: Vec<Result<T, String>> =
            urls.iter().map(|_| Err(CANCELLED_REASON.to_string())).collect();

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut set = JoinSet::new();
        for (idx, url) in urls.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let work = job(url.clone());
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let result = AssertUnwindSafe(work)
                    .catch_unwind()
                    .await
                    .map_err(|_| WORKER_PANICKED.to_string());
                (idx, result)
            });
        }

        let expired = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        let mut interrupted = false;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    interrupted = true;
                    break;
                }
                () = &mut expired => {
                    interrupted = true;
                    break;
                }
                joined = set.join_next() => match joined {
                    Some(joined) => self.record(joined, urls, &mut slots, &mut progress, start),
                    None => break,
                },
            }
        }

        if interrupted {
            set.abort_all();
            // Jobs that finished before the abort still report their result.
            while let Some(joined) = set.join_next().await {
                if joined.is_ok() {
                    self.record(joined, urls, &mut slots, &mut progress, start);
                }
            }
            let unfinished = slots
                .iter()
                .filter(|s| matches!(s, Err(reason) if reason == CANCELLED_REASON))
                .count();
            progress.record_cancelled(unfinished);
        }

        progress.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            total = progress.total,
            succeeded = progress.success_count,
            failed = progress.error_count,
            cancelled = progress.cancelled_count,
            elapsed_ms = progress.elapsed_ms,
            "Worker pool finished"
        );

        PoolRun {
            slots,
            progress,
            interrupted,
        }
    }

    fn record<T: WorkOutcome>(
        &self,
        joined: Result<(usize, Result<T, String>), tokio::task::JoinError>,
        urls: &[SearchResultUrl],
        slots: &mut [Result<T, String>],
        progress: &mut FetchProgress,
        start: Instant,
    ) {
        match joined {
            Ok((idx, Ok(value))) => {
                Self::tally(&value, urls[idx].as_str(), progress, start);
                debug!(
                    completed = progress.completed,
                    percent = progress.percent(),
                    limit = self.max_concurrent,
                    "Fetch progress"
                );
                slots[idx] = Ok(value);
            }
            Ok((idx, Err(reason))) => {
                error!(url = %urls[idx], error = %reason, "Worker failed");
                progress.record_error(urls[idx].as_str(), start.elapsed().as_secs_f64() * 1000.0);
                slots[idx] = Err(reason);
            }
            Err(e) => {
                debug!(error = %e, "Worker aborted");
            }
        }
    }

    fn tally<T: WorkOutcome>(value: &T, url: &str, progress: &mut FetchProgress, start: Instant) {
        let elapsed = start.elapsed().as_secs_f64() * 1000.0;
        if value.succeeded() {
            progress.record_success(url, elapsed);
        } else {
            progress.record_error(url, elapsed);
        }
    }

    /// Fetches and parses every URL, keyed by URL.
    pub async fn extract(
        &self,
        urls: &[SearchResultUrl],
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn ContentExtractor>,
        observer: Arc<dyn FetchObserver>,
        cancel: &CancellationToken,
        deadline: Option<tokio::time::Instant>,
    ) -> HashMap<SearchResultUrl, FetchOutcome> {
        let run = self
            .process(urls, cancel, deadline, |url| {
                let fetcher = Arc::clone(&fetcher);
                let extractor = Arc::clone(&extractor);
                let observer = Arc::clone(&observer);
                async move {
                    fetch_and_parse(fetcher.as_ref(), extractor.as_ref(), observer.as_ref(), &url)
                        .await
                }
            })
            .await;

        urls.iter()
            .cloned()
            .zip(run.slots)
            .map(|(url, slot)| (url, slot.unwrap_or_else(FetchOutcome::failed)))
            .collect()
    }
}

/// Fetches one URL and turns the response into a [`FetchOutcome`].
///
/// Never fails: every problem becomes a `Failed` outcome with a stable
/// reason string.
pub async fn fetch_and_parse(
    fetcher: &dyn Fetcher,
    extractor: &dyn ContentExtractor,
    observer: &dyn FetchObserver,
    url: &SearchResultUrl,
) -> FetchOutcome {
    let request_id = Uuid::new_v4().to_string();
    let start = Instant::now();
    observer.on_fetch_start(url.as_str(), &request_id);

    let outcome = match fetcher.fetch(url.as_str()).await {
        Ok(result) => {
            observer.on_fetch_complete(
                url.as_str(),
                &request_id,
                result.duration_ms,
                result.status_code,
            );
            if !result.is_success() {
                FetchOutcome::failed(format!("http status {}", result.status_code))
            } else if result.is_plain_text() || result.is_html() {
                let parse_start = Instant::now();
                let content_type = result
                    .media_type()
                    .unwrap_or_else(|| "text/html".to_string());
                let text = if result.is_plain_text() {
                    crate::normalize::truncate_chars(&result.text, extractor.config().max_chars)
                        .to_string()
                } else {
                    extractor.extract(&result.text)
                };
                let chars = text.trim().chars().count();
                observer.on_extract_complete(
                    url.as_str(),
                    &request_id,
                    parse_start.elapsed().as_secs_f64() * 1000.0,
                    chars,
                );
                if chars < extractor.config().min_text_length {
                    FetchOutcome::failed(format!("content too short ({chars} chars)"))
                } else {
                    FetchOutcome::content(text, content_type)
                }
            } else {
                FetchOutcome::failed(format!(
                    "unsupported content type: {}",
                    result.content_type.as_deref().unwrap_or("unknown")
                ))
            }
        }
        Err(InsightError::FetchFailed { reason, .. }) => FetchOutcome::failed(reason),
        Err(e) => FetchOutcome::failed(format!("network error: {e}")),
    };

    if let Some(reason) = outcome.failure_reason() {
        observer.on_fetch_error(url.as_str(), &request_id, reason);
    }
    debug!(
        url = %url,
        ok = outcome.is_content(),
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Fetch/parse finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;
    use crate::fetch::ReadableContentExtractor;
    use crate::observability::NoOpFetchObserver;
    use crate::testing::{article_html, RecordingFetchObserver, StubFetcher};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const BODY: &str = "Heat pumps move heat instead of generating it, so they deliver several \
        units of heating for every unit of electricity. Cold climate models now work well \
        below freezing. Installers report strong demand across northern states this winter.";

    fn url(s: &str) -> SearchResultUrl {
        SearchResultUrl::parse(s).unwrap()
    }

    fn extractor() -> Arc<dyn ContentExtractor> {
        Arc::new(ReadableContentExtractor::new(ExtractionConfig::default()).unwrap())
    }

    async fn outcome_for(fetcher: &StubFetcher, target: &str) -> FetchOutcome {
        fetch_and_parse(fetcher, extractor().as_ref(), &NoOpFetchObserver, &url(target)).await
    }

    #[test]
    fn test_progress_percent() {
        let mut progress = FetchProgress::new(4);
        assert_eq!(progress.percent(), 0.0);
        progress.record_success("https://a.example/", 1.0);
        progress.record_error("https://b.example/", 2.0);
        assert_eq!(progress.percent(), 50.0);
        assert_eq!(progress.current_url.as_deref(), Some("https://b.example/"));
        assert_eq!(FetchProgress::new(0).percent(), 0.0);
    }

    #[tokio::test]
    async fn test_fetch_and_parse_classifies_failures() {
        let fetcher = StubFetcher::new()
            .with_html("https://ok.example/", article_html("Heat", &[BODY]))
            .with_status("https://missing.example/", 404)
            .with_response("https://json.example/", 200, Some("application/json"), "{}")
            .with_html("https://short.example/", "<html><body><p>tiny</p></body></html>")
            .with_failure("https://slow.example/", "timeout");

        assert!(outcome_for(&fetcher, "https://ok.example/").await.is_content());
        assert_eq!(
            outcome_for(&fetcher, "https://missing.example/").await,
            FetchOutcome::failed("http status 404")
        );
        assert_eq!(
            outcome_for(&fetcher, "https://json.example/").await,
            FetchOutcome::failed("unsupported content type: application/json")
        );
        assert_eq!(
            outcome_for(&fetcher, "https://short.example/").await,
            FetchOutcome::failed("content too short (4 chars)")
        );
        assert_eq!(
            outcome_for(&fetcher, "https://slow.example/").await,
            FetchOutcome::failed("timeout")
        );
    }

    #[tokio::test]
    async fn test_plain_text_bypasses_html_extraction() {
        let fetcher = StubFetcher::new().with_response(
            "https://notes.example/",
            200,
            Some("text/plain; charset=utf-8"),
            BODY,
        );
        let outcome = outcome_for(&fetcher, "https://notes.example/").await;
        assert_eq!(outcome, FetchOutcome::content(BODY, "text/plain"));
    }

    #[tokio::test]
    async fn test_observer_sees_lifecycle() {
        let fetcher = StubFetcher::new().with_status("https://gone.example/", 410);
        let observer = RecordingFetchObserver::default();
        fetch_and_parse(&fetcher, extractor().as_ref(), &observer, &url("https://gone.example/"))
            .await;
        assert_eq!(
            observer.events(),
            vec![
                "start https://gone.example/".to_string(),
                "complete https://gone.example/ 410".to_string(),
                "error https://gone.example/ http status 410".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_extract_keys_every_url() {
        let fetcher = Arc::new(
            StubFetcher::new()
                .with_html("https://a.example/", article_html("A", &[BODY]))
                .with_status("https://b.example/", 500),
        );
        let urls = vec![url("https://a.example/"), url("https://b.example/")];
        let outcomes = WorkerPool::new(2)
            .extract(
                &urls,
                fetcher,
                extractor(),
                Arc::new(NoOpFetchObserver),
                &CancellationToken::new(),
                None,
            )
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[&urls[0]].is_content());
        assert_eq!(outcomes[&urls[1]].failure_reason(), Some("http status 500"));
    }

    #[tokio::test]
    async fn test_process_preserves_input_order() {
        let fetcher = Arc::new(
            StubFetcher::new()
                .with_html("https://slow.example/", article_html("Slow", &[BODY]))
                .with_delay("https://slow.example/", Duration::from_millis(150))
                .with_html("https://fast.example/", article_html("Fast", &[BODY])),
        );
        let urls = vec![url("https://slow.example/"), url("https://fast.example/")];
        let extractor = extractor();
        let run = WorkerPool::new(2)
            .process(&urls, &CancellationToken::new(), None, |u| {
                let fetcher = Arc::clone(&fetcher);
                let extractor = Arc::clone(&extractor);
                async move {
                    fetch_and_parse(fetcher.as_ref(), extractor.as_ref(), &NoOpFetchObserver, &u)
                        .await
                }
            })
            .await;

        assert!(!run.interrupted);
        assert_eq!(run.progress.success_count, 2);
        let texts: Vec<String> = run
            .slots
            .into_iter()
            .map(|s| match s.unwrap() {
                FetchOutcome::Content { text, .. } => text,
                FetchOutcome::Failed { reason } => reason,
            })
            .collect();
        assert!(texts[0].starts_with("Slow"));
        assert!(texts[1].starts_with("Fast"));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let mut stub = StubFetcher::new();
        let mut urls = Vec::new();
        for i in 0..8 {
            let u = format!("https://host{i}.example/");
            stub = stub
                .with_html(&u, article_html("Page", &[BODY]))
                .with_delay(&u, Duration::from_millis(40));
            urls.push(url(&u));
        }
        let fetcher = Arc::new(stub);
        let outcomes = WorkerPool::new(3)
            .extract(
                &urls,
                Arc::clone(&fetcher) as Arc<dyn Fetcher>,
                extractor(),
                Arc::new(NoOpFetchObserver),
                &CancellationToken::new(),
                None,
            )
            .await;

        assert_eq!(outcomes.len(), 8);
        assert!(fetcher.max_in_flight() <= 3);
        assert!(fetcher.max_in_flight() >= 1);
    }

    #[tokio::test]
    async fn test_cancellation_keeps_finished_work() {
        let fetcher = Arc::new(
            StubFetcher::new()
                .with_html("https://done.example/", article_html("Done", &[BODY]))
                .with_html("https://stuck.example/", article_html("Stuck", &[BODY]))
                .with_delay("https://stuck.example/", Duration::from_secs(30)),
        );
        let urls = vec![url("https://done.example/"), url("https://stuck.example/")];
        let cancel = CancellationToken::shared();

        let trigger = Arc::clone(&cancel);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel("user abort");
        });

        let started = Instant::now();
        let outcomes = WorkerPool::new(2)
            .extract(
                &urls,
                fetcher,
                extractor(),
                Arc::new(NoOpFetchObserver),
                &cancel,
                None,
            )
            .await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(outcomes[&urls[0]].is_content());
        assert_eq!(outcomes[&urls[1]], FetchOutcome::cancelled());
    }

    #[tokio::test]
    async fn test_deadline_behaves_like_cancellation() {
        let fetcher = Arc::new(
            StubFetcher::new()
                .with_html("https://stuck.example/", article_html("Stuck", &[BODY]))
                .with_delay("https://stuck.example/", Duration::from_secs(30)),
        );
        let urls = vec![url("https://stuck.example/")];
        let deadline = tokio::time::Instant::now() + Duration::from_millis(50);
        let run = WorkerPool::new(1)
            .process(&urls, &CancellationToken::new(), Some(deadline), |u| {
                let fetcher = Arc::clone(&fetcher);
                async move {
                    fetch_and_parse(fetcher.as_ref(), extractor().as_ref(), &NoOpFetchObserver, &u)
                        .await
                }
            })
            .await;

        assert!(run.interrupted);
        assert_eq!(run.progress.cancelled_count, 1);
        assert_eq!(run.slots[0].as_ref().unwrap_err(), CANCELLED_REASON);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let run = WorkerPool::new(4)
            .process(&[], &CancellationToken::new(), None, |_| async {
                FetchOutcome::failed("unused")
            })
            .await;
        assert!(run.slots.is_empty());
        assert!(!run.interrupted);
    }
}
