//! Evidence assessment over a chain of search backends.
//!
//! Each claim is searched with the first backend that answers; the hits are
//! then classified and aggregated by `safeguard-core`. A claim for which every
//! backend failed still yields an assessment: NO_SUPPORT with the fallback
//! marker set, so one outage never aborts the pipeline.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use safeguard_core::{assess_hits, AggregationPolicy, Claim, EvidenceAssessment, TierTable};

use crate::search::{SearchError, SearchProvider};

/// Default per-attempt search timeout.
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Searches for evidence and grades it against the tier table.
pub struct EvidenceAssessor {
    /// Backends in fallback order.
    providers: Vec<Arc<dyn SearchProvider>>,
    table: Arc<TierTable>,
    policy: AggregationPolicy,
    timeout: Duration,
    concurrent: bool,
}

impl EvidenceAssessor {
    /// Create an assessor with no backends, using the built-in tier table.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
            table: Arc::new(TierTable::builtin().clone()),
            policy: AggregationPolicy::default(),
            timeout: DEFAULT_SEARCH_TIMEOUT,
            concurrent: false,
        }
    }

    /// Append a backend to the end of the fallback chain.
    pub fn with_provider(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_table(mut self, table: Arc<TierTable>) -> Self {
        self.table = table;
        self
    }

    pub fn with_policy(mut self, policy: AggregationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Look up claims concurrently instead of one after another.
    ///
    /// Output order is the claim order either way.
    pub fn with_concurrency(mut self, concurrent: bool) -> Self {
        self.concurrent = concurrent;
        self
    }

    /// Names of the configured backends, in fallback order.
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn table(&self) -> &TierTable {
        &self.table
    }

    /// Assess every claim, preserving order.
    pub async fn assess(&self, claims: &[Claim]) -> Vec<EvidenceAssessment> {
        if self.concurrent {
            join_all(claims.iter().map(|claim| self.assess_claim(claim))).await
        } else {
            let mut assessments = Vec::with_capacity(claims.len());
            for claim in claims {
                assessments.push(self.assess_claim(claim).await);
            }
            assessments
        }
    }

    /// Assess one claim, walking the fallback chain.
    pub async fn assess_claim(&self, claim: &str) -> EvidenceAssessment {
        for provider in &self.providers {
            match self.search_with_timeout(provider.as_ref(), claim).await {
                Ok(hits) => {
                    tracing::debug!(
                        provider = provider.name(),
                        hits = hits.len(),
                        "Search succeeded"
                    );
                    return assess_hits(claim, &hits, &self.table, self.policy);
                }
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        "Search failed, trying next provider"
                    );
                }
            }
        }

        tracing::warn!("All search providers failed, using fallback assessment");
        EvidenceAssessment::unavailable(claim)
    }

    async fn search_with_timeout(
        &self,
        provider: &dyn SearchProvider,
        query: &str,
    ) -> Result<Vec<safeguard_core::SearchHit>, SearchError> {
        match tokio::time::timeout(self.timeout, provider.search(query)).await {
            Ok(result) => result,
            Err(_) => Err(SearchError::Timeout(self.timeout)),
        }
    }
}

impl Default for EvidenceAssessor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EvidenceAssessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvidenceAssessor")
            .field("providers", &self.provider_names())
            .field("policy", &self.policy)
            .field("timeout", &self.timeout)
            .field("concurrent", &self.concurrent)
            .finish()
    }
}
