//! DuckDuckGo HTML search backend.
//!
//! Scrapes the no-JavaScript results page. No credentials needed, so this is
//! the usual last entry in the fallback chain.

use super::{SearchError, SearchProvider, DEFAULT_RESULTS_PER_QUERY};
use async_trait::async_trait;
use safeguard_core::SearchHit;
use scraper::{ElementRef, Html, Selector};

const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0";
const UNKNOWN_TITLE: &str = "Unknown Source";

/// DuckDuckGo HTML results scraper.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearchProvider {
    endpoint: String,
    results_per_query: usize,
}

impl Default for DuckDuckGoSearchProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DuckDuckGoSearchProvider {
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            results_per_query: DEFAULT_RESULTS_PER_QUERY,
        }
    }

    pub fn with_results_per_query(mut self, results: usize) -> Self {
        self.results_per_query = results.max(1);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Extract up to `limit` hits from a DuckDuckGo HTML results page.
///
/// `a.result__url` links and `a.result__a` titles are selected separately and
/// paired by position. A link without a matching title gets a placeholder.
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let (Ok(link_selector), Ok(title_selector)) =
        (Selector::parse("a.result__url"), Selector::parse("a.result__a"))
    else {
        return Vec::new();
    };

    let document = Html::parse_document(html);
    let titles: Vec<String> = document.select(&title_selector).map(element_text).collect();

    document
        .select(&link_selector)
        .filter_map(|el| el.value().attr("href"))
        .take(limit)
        .enumerate()
        .map(|(i, link)| {
            let title = titles
                .get(i)
                .filter(|t| !t.is_empty())
                .cloned()
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
            SearchHit::new(normalize_link(link), title)
        })
        .collect()
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Protocol-relative links get an explicit scheme.
fn normalize_link(link: &str) -> String {
    let link = link.trim();
    if link.starts_with("//") {
        format!("https:{}", link)
    } else {
        link.to_string()
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearchProvider {
    #[cfg(feature = "duckduckgo")]
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let response = crate::providers::http_client()
            .get(&self.endpoint)
            .query(&[("q", query)])
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await
            .map_err(|e| SearchError::Http(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::RateLimited);
        }
        if !status.is_success() {
            return Err(SearchError::Api {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("request failed").to_string(),
            });
        }

        let html = response
            .text()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;

        let hits = parse_results(&html, self.results_per_query);
        tracing::debug!(query = %query, hits = hits.len(), "DuckDuckGo search complete");
        Ok(hits)
    }

    #[cfg(not(feature = "duckduckgo"))]
    async fn search(&self, _query: &str) -> Result<Vec<SearchHit>, SearchError> {
        Err(SearchError::NotConfigured(
            "DuckDuckGo search requires 'duckduckgo' feature".to_string(),
        ))
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}
