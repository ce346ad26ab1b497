//! Search dispatch: query in, ordered candidate URLs out.

mod dispatcher;
mod duckduckgo;
mod provider;

pub use dispatcher::{dedup_urls, Dispatch, SearchDispatcher};
pub use duckduckgo::{parse_results, DuckDuckGoProvider};
pub use provider::SearchProvider;

#[cfg(test)]
pub(crate) use provider::MockSearchProvider;
