//! Google Custom Search backend.
//!
//! Needs an API key and a search engine id (`cx`). An optional backup pair is
//! tried once when the primary pair reports its quota exhausted.

use super::{SearchError, SearchProvider, DEFAULT_RESULTS_PER_QUERY};
use crate::providers::{ApiCredential, CredentialBuilder, CredentialSet, ProviderError};
use async_trait::async_trait;
use safeguard_core::SearchHit;
use serde::Deserialize;
use serde_json::Value as JsonValue;

pub const GOOGLE_SEARCH_API_KEY_ENV: &str = "GOOGLE_SEARCH_API_KEY";
pub const GOOGLE_SEARCH_CX_ENV: &str = "GOOGLE_SEARCH_CX";
pub const GOOGLE_SEARCH_API_KEY_BACKUP_ENV: &str = "GOOGLE_SEARCH_API_KEY_BACKUP";
pub const GOOGLE_SEARCH_CX_BACKUP_ENV: &str = "GOOGLE_SEARCH_CX_BACKUP";

const DEFAULT_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

/// Title used when a result carries none.
const UNKNOWN_TITLE: &str = "Unknown Source";

/// Google Custom Search JSON API client.
#[derive(Debug)]
pub struct GoogleSearchProvider {
    credentials: CredentialSet,
    endpoint: String,
    results_per_query: usize,
}

impl GoogleSearchProvider {
    /// Load credentials from `config`, falling back to the environment.
    pub fn from_config(config: &JsonValue) -> Result<Self, SearchError> {
        let credentials = CredentialBuilder::new()
            .require("api_key", GOOGLE_SEARCH_API_KEY_ENV, "Google Search API key")
            .require("cx", GOOGLE_SEARCH_CX_ENV, "Google search engine id")
            .optional(
                "backup_api_key",
                GOOGLE_SEARCH_API_KEY_BACKUP_ENV,
                "Google Search backup API key",
            )
            .optional("backup_cx", GOOGLE_SEARCH_CX_BACKUP_ENV, "Google backup search engine id")
            .build(config)
            .map_err(|e| SearchError::NotConfigured(e.to_string()))?;

        let endpoint = config["endpoint"]
            .as_str()
            .unwrap_or(DEFAULT_ENDPOINT)
            .to_string();

        Ok(Self {
            credentials,
            endpoint,
            results_per_query: DEFAULT_RESULTS_PER_QUERY,
        })
    }

    /// Custom Search returns at most 10 results per call.
    pub fn with_results_per_query(mut self, results: usize) -> Self {
        self.results_per_query = results.clamp(1, 10);
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Whether a complete backup key pair is configured.
    pub fn has_backup(&self) -> bool {
        self.credentials.has("backup_api_key") && self.credentials.has("backup_cx")
    }

    /// Key pairs in the order they are tried: primary, then the backup when
    /// both of its halves are present. Only a 429 moves on to the next pair.
    fn key_pairs(&self) -> Result<Vec<(&ApiCredential, &ApiCredential)>, SearchError> {
        let not_configured = |e: ProviderError| SearchError::NotConfigured(e.to_string());
        let mut pairs = vec![(
            self.credentials.get("api_key").map_err(not_configured)?,
            self.credentials.get("cx").map_err(not_configured)?,
        )];
        if let Some(backup) = self
            .credentials
            .get_optional("backup_api_key")
            .zip(self.credentials.get_optional("backup_cx"))
        {
            pairs.push(backup);
        }
        Ok(pairs)
    }

    #[cfg(feature = "google")]
    async fn request(
        &self,
        query: &str,
        key: &str,
        cx: &str,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let num = self.results_per_query.to_string();
        let response = crate::providers::http_client()
            .get(&self.endpoint)
            .query(&[("key", key), ("cx", cx), ("q", query), ("num", num.as_str())])
            .send()
            .await
            // The key is part of the URL, keep it out of error text
            .map_err(|e| SearchError::Http(e.without_url().to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::RateLimited);
        }

        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.without_url().to_string()))?;

        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            return Err(SearchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        parse_response(body)
    }

    #[cfg(not(feature = "google"))]
    async fn request(
        &self,
        _query: &str,
        _key: &str,
        _cx: &str,
    ) -> Result<Vec<SearchHit>, SearchError> {
        Err(SearchError::NotConfigured(
            "Google search requires 'google' feature".to_string(),
        ))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
    #[serde(default)]
    title: Option<String>,
}

/// Convert a Custom Search response body into hits.
///
/// A body without `items` means the query matched nothing.
fn parse_response(body: JsonValue) -> Result<Vec<SearchHit>, SearchError> {
    let response: SearchResponse =
        serde_json::from_value(body).map_err(|e| SearchError::Parse(e.to_string()))?;

    Ok(response
        .items
        .into_iter()
        .map(|item| {
            let title = item
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string());
            SearchHit::new(item.link, title)
        })
        .collect())
}

#[async_trait]
impl SearchProvider for GoogleSearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, SearchError> {
        let pairs = self.key_pairs()?;
        let mut result = Err(SearchError::RateLimited);

        for (attempt, (key, cx)) in pairs.into_iter().enumerate() {
            if attempt > 0 {
                tracing::warn!("Primary Google key quota exceeded, trying backup key");
            }
            result = self.request(query, key.expose(), cx.expose()).await;
            if !matches!(result, Err(SearchError::RateLimited)) {
                break;
            }
        }

        result
    }

    fn name(&self) -> &str {
        "google"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_not_configured() {
        let config = serde_json::json!({
            "api_key": "your_google_api_key_here",
            "cx": "your_google_cx_here"
        });
        if std::env::var(GOOGLE_SEARCH_API_KEY_ENV).is_err() {
            assert!(matches!(
                GoogleSearchProvider::from_config(&config),
                Err(SearchError::NotConfigured(_))
            ));
        }
    }

    #[test]
    fn test_backup_requires_both_halves() {
        let only_key = serde_json::json!({
            "api_key": "k", "cx": "c", "backup_api_key": "bk",
            "backup_cx": "your_backup_cx_here"
        });
        if std::env::var(GOOGLE_SEARCH_CX_BACKUP_ENV).is_err() {
            assert!(!GoogleSearchProvider::from_config(&only_key).unwrap().has_backup());
        }

        let both = serde_json::json!({
            "api_key": "k", "cx": "c", "backup_api_key": "bk", "backup_cx": "bc"
        });
        assert!(GoogleSearchProvider::from_config(&both).unwrap().has_backup());
    }

    #[test]
    fn test_parse_items() {
        let body = serde_json::json!({
            "items": [
                {"link": "https://www.cdc.gov/flu", "title": "Flu | CDC"},
                {"link": "https://example.com/x"},
                {"link": "https://example.org/y", "title": "  "}
            ]
        });

        let hits = parse_response(body).unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0], SearchHit::new("https://www.cdc.gov/flu", "Flu | CDC"));
        assert_eq!(hits[1].title, UNKNOWN_TITLE);
        assert_eq!(hits[2].title, UNKNOWN_TITLE);
    }

    #[test]
    fn test_parse_no_items_is_empty() {
        let body = serde_json::json!({ "searchInformation": { "totalResults": "0" } });
        assert!(parse_response(body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_malformed_item() {
        let body = serde_json::json!({ "items": [ { "title": "no link" } ] });
        assert!(matches!(parse_response(body), Err(SearchError::Parse(_))));
    }

    fn exposed<'a>(pairs: Vec<(&'a ApiCredential, &'a ApiCredential)>) -> Vec<(&'a str, &'a str)> {
        pairs
            .into_iter()
            .map(|(key, cx)| (key.expose(), cx.expose()))
            .collect()
    }

    #[test]
    fn test_key_pairs_primary_then_backup() {
        let config = serde_json::json!({
            "api_key": "k", "cx": "c", "backup_api_key": "bk", "backup_cx": "bc"
        });
        let provider = GoogleSearchProvider::from_config(&config).unwrap();
        assert_eq!(exposed(provider.key_pairs().unwrap()), [("k", "c"), ("bk", "bc")]);
    }

    #[test]
    fn test_key_pairs_skip_placeholder_backup() {
        let config = serde_json::json!({
            "api_key": "k", "cx": "c",
            "backup_api_key": "your_google_api_key_here", "backup_cx": "bc"
        });
        if std::env::var(GOOGLE_SEARCH_API_KEY_BACKUP_ENV).is_err() {
            let provider = GoogleSearchProvider::from_config(&config).unwrap();
            assert_eq!(exposed(provider.key_pairs().unwrap()), [("k", "c")]);
        }
    }

    #[test]
    fn test_results_per_query_at_least_one() {
        let config = serde_json::json!({ "api_key": "k", "cx": "c" });
        let provider = GoogleSearchProvider::from_config(&config)
            .unwrap()
            .with_results_per_query(0);
        assert_eq!(provider.results_per_query, 1);
    }

    #[cfg(feature = "google")]
    mod http {
        use super::*;
        use crate::assessor::tests::MockSearch;
        use crate::assessor::EvidenceAssessor;
        use safeguard_core::EvidenceStatus;
        use std::sync::Arc;
        use wiremock::matchers::{method, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        const CLAIM: &str = "Vitamin D supplements improve bone health.";

        fn provider(server: &MockServer, backup_key: &str) -> GoogleSearchProvider {
            let config = serde_json::json!({
                "api_key": "primary-key",
                "cx": "primary-cx",
                "backup_api_key": backup_key,
                "backup_cx": "backup-cx",
            });
            GoogleSearchProvider::from_config(&config)
                .unwrap()
                .with_endpoint(server.uri())
        }

        async fn primary_rate_limited(server: &MockServer, calls: u64) {
            Mock::given(method("GET"))
                .and(query_param("key", "primary-key"))
                .respond_with(ResponseTemplate::new(429))
                .expect(calls)
                .mount(server)
                .await;
        }

        #[tokio::test]
        async fn test_rate_limit_retries_with_backup_pair() {
            let server = MockServer::start().await;
            primary_rate_limited(&server, 1).await;
            Mock::given(method("GET"))
                .and(query_param("key", "backup-key"))
                .and(query_param("cx", "backup-cx"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "items": [{"link": "https://www.cdc.gov/vitamin-d", "title": "Vitamin D"}]
                })))
                .expect(1)
                .mount(&server)
                .await;

            let hits = provider(&server, "backup-key").search(CLAIM).await.unwrap();
            assert_eq!(hits, [SearchHit::new("https://www.cdc.gov/vitamin-d", "Vitamin D")]);
        }

        #[tokio::test]
        async fn test_other_errors_do_not_use_backup() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(query_param("key", "primary-key"))
                .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                    "error": {"message": "API key not valid"}
                })))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("GET"))
                .and(query_param("key", "backup-key"))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(&server)
                .await;

            let err = provider(&server, "backup-key").search(CLAIM).await.unwrap_err();
            assert!(matches!(err, SearchError::Api { status: 403, .. }));
        }

        #[tokio::test]
        async fn test_placeholder_backup_falls_through_chain() {
            if std::env::var(GOOGLE_SEARCH_API_KEY_BACKUP_ENV).is_ok() {
                return;
            }
            let server = MockServer::start().await;
            // once directly, once through the assessor
            primary_rate_limited(&server, 2).await;

            let google = Arc::new(provider(&server, "your_google_api_key_here"));
            assert!(matches!(google.search(CLAIM).await, Err(SearchError::RateLimited)));

            let duckduckgo = MockSearch::hits("duckduckgo", &["https://www.mayoclinic.org/x"]);
            let assessor = EvidenceAssessor::new()
                .with_provider(google)
                .with_provider(duckduckgo.clone());

            let assessment = assessor.assess_claim(CLAIM).await;
            assert_eq!(assessment.evidence_status, EvidenceStatus::PartialSupport);
            assert!(!assessment.fallback_applied);
            assert_eq!(duckduckgo.call_count(), 1);
        }
    }
}
