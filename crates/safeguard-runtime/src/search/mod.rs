//! Web search backends used to gather evidence for claims.
//!
//! The assessor tries backends in configured order and stops at the first
//! one that answers. An empty result list counts as an answer.

use async_trait::async_trait;
use safeguard_core::SearchHit;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

mod duckduckgo;
mod google;

pub use duckduckgo::{parse_results as parse_duckduckgo_results, DuckDuckGoSearchProvider};
pub use google::{
    GoogleSearchProvider, GOOGLE_SEARCH_API_KEY_BACKUP_ENV, GOOGLE_SEARCH_API_KEY_ENV,
    GOOGLE_SEARCH_CX_BACKUP_ENV, GOOGLE_SEARCH_CX_ENV,
};

/// Default number of hits requested per query.
pub const DEFAULT_RESULTS_PER_QUERY: usize = 10;

/// Errors from search backends.
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search quota exceeded")]
    RateLimited,

    #[error("Search request failed: {0}")]
    Http(String),

    #[error("Search API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Could not parse search response: {0}")]
    Parse(String),

    #[error("Search provider not configured: {0}")]
    NotConfigured(String),

    #[error("Search timed out after {0:?}")]
    Timeout(Duration),
}

/// A web search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Search for `query` and return hits in the backend's ranking order.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

/// Build a search backend by name.
///
/// Known names are `"google"` and `"duckduckgo"`. `config` carries
/// credentials for backends that need them; environment variables fill in
/// whatever the config leaves out.
pub fn create_search_provider(
    name: &str,
    config: &JsonValue,
    results_per_query: usize,
) -> Result<Arc<dyn SearchProvider>, SearchError> {
    match name {
        "google" => Ok(Arc::new(
            GoogleSearchProvider::from_config(config)?.with_results_per_query(results_per_query),
        )),
        "duckduckgo" => Ok(Arc::new(
            DuckDuckGoSearchProvider::new().with_results_per_query(results_per_query),
        )),
        other => Err(SearchError::NotConfigured(format!(
            "Unknown search provider: '{}'. Available: [\"duckduckgo\", \"google\"]",
            other
        ))),
    }
}
