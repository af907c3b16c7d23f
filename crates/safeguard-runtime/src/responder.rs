//! Chat-mode answer generation.

use std::sync::Arc;

use crate::prompts::CHAT_SYSTEM_PROMPT;
use crate::providers::{ChatMessage, CompletionConfig, LlmProvider, ProviderError};

/// Generates a free-text answer to a user's health question.
///
/// The answer is not trusted: the pipeline screens it like any other content
/// before anything reaches the user.
pub struct ResponseGenerator {
    provider: Arc<dyn LlmProvider>,
    config: CompletionConfig,
}

impl ResponseGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>, config: CompletionConfig) -> Self {
        Self { provider, config }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn is_ready(&self) -> bool {
        self.provider.health_check().await
    }

    /// Ask the provider to answer `message`. Returns trimmed, non-empty text.
    pub async fn generate(&self, message: &str) -> Result<String, ProviderError> {
        let messages = vec![
            ChatMessage::system(CHAT_SYSTEM_PROMPT),
            ChatMessage::user(message),
        ];

        let response = tokio::time::timeout(
            self.config.timeout,
            self.provider.complete(messages, &self.config),
        )
        .await
        .map_err(|_| ProviderError::Timeout(self.config.timeout))??;

        let text = response.content.trim();
        if text.is_empty() {
            tracing::warn!(
                provider = self.provider.name(),
                stop_reason = response.stop_reason.as_deref().unwrap_or("none"),
                "Chat provider returned no text"
            );
            return Err(ProviderError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

impl std::fmt::Debug for ResponseGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseGenerator")
            .field("provider", &self.provider.name())
            .field("model", &self.config.model)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explainer::tests::MockLlm;

    #[tokio::test]
    async fn test_generate_trims_reply() {
        let generator = ResponseGenerator::new(
            Arc::new(MockLlm::Reply("\n Stay hydrated. \n")),
            CompletionConfig::default(),
        );
        assert_eq!(generator.generate("How do I stay healthy?").await.unwrap(), "Stay hydrated.");
    }

    #[tokio::test]
    async fn test_empty_reply_is_error() {
        let generator =
            ResponseGenerator::new(Arc::new(MockLlm::Reply("")), CompletionConfig::default());
        assert!(matches!(
            generator.generate("hello").await,
            Err(ProviderError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_provider_error_propagates() {
        let generator =
            ResponseGenerator::new(Arc::new(MockLlm::Fail), CompletionConfig::default());
        assert!(matches!(
            generator.generate("hello").await,
            Err(ProviderError::AuthError)
        ));
    }

    #[tokio::test]
    async fn test_readiness_follows_provider_health() {
        let ready =
            ResponseGenerator::new(Arc::new(MockLlm::Reply("ok")), CompletionConfig::default());
        let broken = ResponseGenerator::new(Arc::new(MockLlm::Fail), CompletionConfig::default());
        assert!(ready.is_ready().await);
        assert!(!broken.is_ready().await);
    }
}
