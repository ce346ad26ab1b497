//! Testing utilities for insightflow pipelines.
//!
//! Deterministic stand-ins for the search provider, the HTTP fetcher and
//! the generative summarizer, plus HTML fixtures.

mod fixtures;
mod mocks;

pub use fixtures::article_html;
pub use mocks::{
    FailingGenerator, FailingSearchProvider, RecordingFetchObserver, SlowGenerator,
    StaticGenerator, StaticSearchProvider, StubFetcher,
};
