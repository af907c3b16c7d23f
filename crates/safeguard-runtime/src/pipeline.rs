//! The safety pipeline: rule filter, claims, evidence, decision, explanation.
//!
//! Stages run in sequence for each request. Only input errors surface to the
//! caller; search and explanation outages are absorbed by their fallbacks,
//! so a well-formed request always gets a classification.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use safeguard_core::{
    screen, AggregationPolicy, ClassificationRequest, ClassificationResponse, DecisionEngine,
    DecisionKind, EvaluationError, ResponseDetails, Severity, TierTable, TierTableError,
};

use crate::assessor::EvidenceAssessor;
use crate::config::{ConfigError, RuntimeConfig};
use crate::explainer::Explainer;
use crate::providers::{CompletionConfig, LlmProvider, ProviderRegistry};
use crate::responder::ResponseGenerator;
use crate::search::{create_search_provider, SearchError, SearchProvider};
use crate::{SERVICE_NAME, SERVICE_VERSION};

/// Errors from the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("No message provided")]
    EmptyMessage,

    #[error("Failed to generate AI response: {0}")]
    GenerationFailed(String),

    #[error("Chat mode has no response provider configured")]
    ChatNotConfigured,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tier table error: {0}")]
    TierTable(#[from] TierTableError),
}

/// Result of chat mode: the generated answer and its classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub user_message: String,
    pub ai_response: String,
    pub decision: DecisionKind,
    pub severity: Severity,
    /// True when the answer may be shown to the user.
    pub safe: bool,
    /// The answer, present only when `safe`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered_response: Option<String>,
    pub explanation: String,
    pub generated_by: String,
    pub details: ResponseDetails,
    pub timestamp: DateTime<Utc>,
}

impl ChatResponse {
    fn from_classification(
        user_message: &str,
        ai_response: String,
        classification: ClassificationResponse,
    ) -> Self {
        let safe = classification.decision.is_safe();
        Self {
            user_message: user_message.to_string(),
            filtered_response: safe.then(|| ai_response.clone()),
            ai_response,
            decision: classification.decision,
            severity: classification.severity,
            safe,
            explanation: classification.explanation,
            generated_by: classification.generated_by,
            details: classification.details,
            timestamp: classification.timestamp,
        }
    }
}

/// A configured text-generation backend and whether it can take requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub provider: String,
    pub ready: bool,
}

/// Service readiness, as reported by `info`.
///
/// `status` is `degraded` when a configured backend is not ready. Missing
/// backends do not count; their fallbacks cover them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub search_providers: Vec<String>,
    pub tier_table_version: String,
    pub explanation: Option<ProviderStatus>,
    pub chat: Option<ProviderStatus>,
}

/// Runs the full classification pipeline.
///
/// Holds no per-request state, so one instance can serve concurrent requests.
#[derive(Debug)]
pub struct SafetyPipeline {
    assessor: EvidenceAssessor,
    explainer: Explainer,
    responder: Option<ResponseGenerator>,
    engine: DecisionEngine,
}

impl SafetyPipeline {
    pub fn builder() -> SafetyPipelineBuilder {
        SafetyPipelineBuilder::new()
    }

    /// Load a YAML config file and build the pipeline it describes.
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let config = RuntimeConfig::from_file(path)?;
        Ok(SafetyPipelineBuilder::from_config(&config)?.build())
    }

    /// Classify a piece of content.
    pub async fn classify(
        &self,
        request: &ClassificationRequest,
    ) -> Result<ClassificationResponse, PipelineError> {
        let screening = screen(request)?;

        let assessments = if screening.needs_evidence() {
            self.assessor.assess(&screening.claims).await
        } else {
            Vec::new()
        };

        let decision = self.engine.decide(&screening.flags, &assessments);
        let explanation = self
            .explainer
            .explain(&decision, &screening.flags, &assessments)
            .await;

        tracing::info!(
            decision = %decision.decision,
            severity = %decision.severity,
            claims = assessments.len(),
            fallback_applied = assessments.iter().any(|a| a.fallback_applied),
            explained_by = %explanation.generated_by,
            "Classification complete"
        );

        Ok(ClassificationResponse::assemble(
            decision,
            explanation,
            screening.flags,
            &assessments,
        ))
    }

    /// Generate an answer to `message`, then classify the answer.
    ///
    /// The answer is classified with an empty user context.
    /// The message is forwarded and echoed back unchanged.
    pub async fn chat(&self, message: &str) -> Result<ChatResponse, PipelineError> {
        if message.trim().is_empty() {
            return Err(PipelineError::EmptyMessage);
        }

        let responder = self
            .responder
            .as_ref()
            .ok_or(PipelineError::ChatNotConfigured)?;

        let answer = responder.generate(message).await.map_err(|e| {
            tracing::warn!(
                provider = responder.provider_name(),
                error = %e,
                "Chat generation failed"
            );
            PipelineError::GenerationFailed(e.to_string())
        })?;

        let classification = self.classify(&ClassificationRequest::text(answer.clone())).await?;
        Ok(ChatResponse::from_classification(message, answer, classification))
    }

    /// Report which backends are configured and whether they are ready.
    pub async fn health(&self) -> HealthReport {
        let explanation = match (self.explainer.provider_name(), self.explainer.is_ready().await) {
            (Some(name), Some(ready)) => Some(ProviderStatus {
                provider: name.to_string(),
                ready,
            }),
            _ => None,
        };
        let chat = match &self.responder {
            Some(responder) => Some(ProviderStatus {
                provider: responder.provider_name().to_string(),
                ready: responder.is_ready().await,
            }),
            None => None,
        };

        let degraded = explanation.iter().chain(&chat).any(|status| !status.ready);
        HealthReport {
            status: if degraded { "degraded" } else { "healthy" },
            service: SERVICE_NAME,
            version: SERVICE_VERSION,
            search_providers: self.search_providers().into_iter().map(String::from).collect(),
            tier_table_version: self.tier_table().table_version.to_string(),
            explanation,
            chat,
        }
    }

    /// Search backends in fallback order.
    pub fn search_providers(&self) -> Vec<&str> {
        self.assessor.provider_names()
    }

    pub fn explanation_provider(&self) -> Option<&str> {
        self.explainer.provider_name()
    }

    pub fn chat_provider(&self) -> Option<&str> {
        self.responder.as_ref().map(|r| r.provider_name())
    }

    pub fn tier_table(&self) -> &TierTable {
        self.assessor.table()
    }
}

/// Builder for [`SafetyPipeline`].
pub struct SafetyPipelineBuilder {
    assessor: EvidenceAssessor,
    explainer: Explainer,
    responder: Option<ResponseGenerator>,
}

impl SafetyPipelineBuilder {
    /// No search backends, fallback explanations, chat disabled.
    pub fn new() -> Self {
        Self {
            assessor: EvidenceAssessor::new(),
            explainer: Explainer::fallback_only(),
            responder: None,
        }
    }

    /// Build everything `config` names, skipping providers that are not configured.
    pub fn from_config(config: &RuntimeConfig) -> Result<Self, PipelineError> {
        let mut builder = Self::new()
            .policy(config.search.policy)
            .search_timeout(config.search.timeout)
            .concurrent_lookups(config.search.concurrent_lookups);

        if let Some(path) = &config.search.tier_table {
            let table = TierTable::from_file(path)?;
            tracing::info!(
                path = %path.display(),
                version = %table.table_version,
                "Loaded custom tier table"
            );
            builder = builder.tier_table(Arc::new(table));
        }

        for name in &config.search.providers {
            let results = config.search.results_per_query;
            match create_search_provider(name, &config.search.google, results) {
                Ok(provider) => builder = builder.search_provider(provider),
                Err(SearchError::NotConfigured(reason)) => {
                    tracing::info!(provider = %name, reason = %reason, "Search provider disabled");
                }
                Err(e) => {
                    tracing::warn!(provider = %name, error = %e, "Search provider unavailable");
                }
            }
        }

        let registry = ProviderRegistry::with_builtin();

        if let Some(name) = &config.explanation.provider {
            match registry.create_validated(name, &config.explanation.settings) {
                Ok(provider) => {
                    builder = builder
                        .explanation_provider(provider, config.explanation.completion_config());
                }
                Err(e) => {
                    tracing::info!(
                        provider = %name,
                        reason = %e,
                        "Explanation provider disabled, using fallback text"
                    );
                }
            }
        }

        if let Some(name) = &config.chat.provider {
            match registry.create_validated(name, &config.chat.settings) {
                Ok(provider) => {
                    builder = builder.chat_provider(provider, config.chat.completion_config());
                }
                Err(e) => {
                    tracing::info!(provider = %name, reason = %e, "Chat provider disabled");
                }
            }
        }

        Ok(builder)
    }

    /// Append a search backend to the fallback chain.
    pub fn search_provider(mut self, provider: Arc<dyn SearchProvider>) -> Self {
        self.assessor = self.assessor.with_provider(provider);
        self
    }

    pub fn tier_table(mut self, table: Arc<TierTable>) -> Self {
        self.assessor = self.assessor.with_table(table);
        self
    }

    pub fn policy(mut self, policy: AggregationPolicy) -> Self {
        self.assessor = self.assessor.with_policy(policy);
        self
    }

    pub fn search_timeout(mut self, timeout: Duration) -> Self {
        self.assessor = self.assessor.with_timeout(timeout);
        self
    }

    pub fn concurrent_lookups(mut self, concurrent: bool) -> Self {
        self.assessor = self.assessor.with_concurrency(concurrent);
        self
    }

    pub fn explanation_provider(
        mut self,
        provider: Arc<dyn LlmProvider>,
        config: CompletionConfig,
    ) -> Self {
        self.explainer = Explainer::new(provider, config);
        self
    }

    pub fn chat_provider(
        mut self,
        provider: Arc<dyn LlmProvider>,
        config: CompletionConfig,
    ) -> Self {
        self.responder = Some(ResponseGenerator::new(provider, config));
        self
    }

    pub fn build(self) -> SafetyPipeline {
        SafetyPipeline {
            assessor: self.assessor,
            explainer: self.explainer,
            responder: self.responder,
            engine: DecisionEngine::new(),
        }
    }
}

impl Default for SafetyPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
