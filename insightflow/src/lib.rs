//! # Insightflow
//!
//! Turns a free-text query into per-page summaries and keywords.
//!
//! A run goes through these stages:
//!
//! - **Search dispatch**: a pluggable provider (DuckDuckGo by default) returns
//!   candidate URLs, which are normalized, deduplicated and capped
//! - **Fetch and parse**: a bounded worker pool downloads pages and extracts
//!   readable text, with per-URL failures isolated
//! - **Normalize**: whitespace is collapsed and the text capped
//! - **Keywords**: single-word terms ranked by a YAKE-style statistic
//! - **Summarize**: an optional generative backend with a deterministic
//!   extractive fallback
//!
//! The result is a [`SearchReport`](models::SearchReport) with one entry per
//! URL in search order. Runs can be cancelled or bounded by a deadline.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use insightflow::prelude::*;
//!
//! let pipeline = InsightPipeline::from_config(PipelineConfig::from_env()?)?;
//! let report = pipeline.run_search("grid scale batteries", 5, 5, 3).await?;
//! for insight in report.results() {
//!     println!("{}: {}", insight.url, insight.summary);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::cast_precision_loss
)]

pub mod cancellation;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod keywords;
pub mod models;
pub mod normalize;
pub mod observability;
pub mod pipeline;
pub mod prediction;
pub mod search;
pub mod summarize;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{
        ExtractionConfig, FetchConfig, GenerativeConfig, PipelineConfig, RetryConfig,
        SearchConfig, SummarizerConfig,
    };
    pub use crate::errors::{InsightError, PredictionError};
    pub use crate::fetch::{ContentExtractor, Fetcher, HttpFetcher, ReadableContentExtractor};
    pub use crate::keywords::{extract_keywords, KeywordExtractor};
    pub use crate::models::{
        KeywordSet, NormalizedDocument, PageInsight, Query, SearchReport, SearchRequest,
        SearchResultUrl, Summary, SummaryKind,
    };
    pub use crate::normalize::normalize;
    pub use crate::observability::{FetchObserver, NoOpFetchObserver, TracingFetchObserver};
    pub use crate::pipeline::InsightPipeline;
    pub use crate::prediction::{LinearModel, ModelRegistry, Prediction, Predictor};
    pub use crate::search::{DuckDuckGoProvider, SearchDispatcher, SearchProvider};
    pub use crate::summarize::{extractive_summary, GenerativeSummarizer, Summarizer};
}
