//! Explanation generation with deterministic fallback.
//!
//! The explainer never fails: any provider problem (missing provider, error,
//! timeout, empty text) yields the fixed fallback sentence for the decision.

use std::sync::Arc;

use safeguard_core::{Decision, EvidenceAssessment, ExplanationResult, RuleFlags};

use crate::prompts::build_explanation_prompt;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};

/// Produces a user-facing explanation for a decision.
pub struct Explainer {
    provider: Option<Arc<dyn LlmProvider>>,
    config: CompletionConfig,
}

impl Explainer {
    /// An explainer that always uses the fallback table.
    pub fn fallback_only() -> Self {
        Self {
            provider: None,
            config: CompletionConfig::default(),
        }
    }

    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self {
            provider: Some(provider),
            config,
        }
    }

    /// Name of the backing provider, if any.
    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_ref().map(|p| p.name())
    }

    pub async fn explain(
        &self,
        decision: &Decision,
        flags: &RuleFlags,
        assessments: &[EvidenceAssessment],
    ) -> ExplanationResult {
        let Some(provider) = &self.provider else {
            return ExplanationResult::fallback(decision.decision);
        };

        match self.generate(provider.as_ref(), decision, flags, assessments).await {
            Ok(text) => ExplanationResult::generated(text, self.config.model.clone()),
            Err(e) => {
                tracing::warn!(
                    provider = provider.name(),
                    decision = %decision.decision,
                    error = %e,
                    "Explanation generation failed, using fallback"
                );
                ExplanationResult::fallback(decision.decision)
            }
        }
    }

    async fn generate(
        &self,
        provider: &dyn LlmProvider,
        decision: &Decision,
        flags: &RuleFlags,
        assessments: &[EvidenceAssessment],
    ) -> Result<String, ProviderError> {
        let prompt = build_explanation_prompt(decision, flags, assessments);
        let messages = vec![ChatMessage::user(prompt)];

        let response = tokio::time::timeout(
            self.config.timeout,
            provider.complete(messages, &self.config),
        )
        .await
        .map_err(|_| ProviderError::Timeout(self.config.timeout))??;

        let text = response.content.trim();
        if text.is_empty() {
            tracing::debug!(
                provider = provider.name(),
                stop_reason = response.stop_reason.as_deref().unwrap_or("none"),
                "Explanation provider returned no text"
            );
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text.to_string())
    }

    /// Whether the backing provider is usable. `None` when there is none.
    pub async fn is_ready(&self) -> Option<bool> {
        match &self.provider {
            Some(provider) => Some(provider.health_check().await),
            None => None,
        }
    }
}

impl std::fmt::Debug for Explainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Explainer")
            .field("provider", &self.provider_name())
            .field("model", &self.config.model)
            .finish()
    }
}
