//! The fetch/parse stage: bounded concurrent retrieval of candidate URLs
//! and extraction of their readable text.

mod extractor;
mod fetcher;
mod pool;

pub use extractor::{ContentExtractor, ReadableContentExtractor};
pub use fetcher::{FetchResult, Fetcher, HttpFetcher, TIMEOUT_REASON, TOO_LARGE_REASON};
pub use pool::{fetch_and_parse, FetchProgress, PoolRun, WorkOutcome, WorkerPool, WORKER_PANICKED};
