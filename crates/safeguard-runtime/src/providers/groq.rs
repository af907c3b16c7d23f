//! Groq provider implementation.
//!
//! Groq serves an OpenAI-compatible chat completions API. It backs chat mode,
//! where the model answers a user question before the answer is screened.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Environment variable name for the Groq API key.
pub const GROQ_API_KEY_ENV: &str = "GROQ_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Groq chat completions provider.
pub struct GroqProvider {
    credential: ApiCredential,
    base_url: String,
}

impl std::fmt::Debug for GroqProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GroqProvider {
    /// Create a new Groq provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(api_key, CredentialSource::Programmatic, "Groq API key"),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from the `GROQ_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(GROQ_API_KEY_ENV, "Groq API key")?;
        Ok(Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Create from JSON configuration with environment fallback.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential =
            ApiCredential::from_config_or_env(config, "api_key", GROQ_API_KEY_ENV, "Groq API key")?;

        let base_url = config["base_url"]
            .as_str()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            credential,
            base_url,
        })
    }
}

/// OpenAI-style request format.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

/// OpenAI-style response format.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GroqError {
    error: GroqErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GroqErrorDetail {
    message: String,
}

/// Turn an API response into a completion, trimming the first choice's text.
fn into_completion(body: ChatCompletionResponse, requested_model: &str) -> CompletionResponse {
    let first = body.choices.into_iter().next();
    let stop_reason = first.as_ref().and_then(|c| c.finish_reason.clone());
    let content = first
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .unwrap_or_default();

    CompletionResponse {
        content,
        usage: body
            .usage
            .map(|u| super::TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default(),
        model: body.model.unwrap_or_else(|| requested_model.to_string()),
        stop_reason,
    }
}

#[async_trait]
impl LlmProvider for GroqProvider {
    #[cfg(feature = "groq")]
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        use std::time::Duration;

        let client = super::http_client();
        let request = ChatCompletionRequest {
            model: &config.model,
            messages: &messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        // SECURITY: Only expose the credential here, at the point of use
        let response = client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.credential.expose())
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(ProviderError::RateLimited { retry_after });
        }

        if status == 401 {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let message = response
                .json::<GroqError>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|e| e.to_string());

            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(into_completion(body, &config.model))
    }

    #[cfg(not(feature = "groq"))]
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            "Groq provider requires 'groq' feature".to_string(),
        ))
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "groq"
    }
}

/// Factory for creating Groq providers from configuration.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "gsk_...",        // Optional, falls back to GROQ_API_KEY env
///   "base_url": "https://..."    // Optional, any OpenAI-compatible endpoint
/// }
/// ```
pub struct GroqProviderFactory;

impl ProviderFactory for GroqProviderFactory {
    fn provider_type(&self) -> &'static str {
        "groq"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let provider = GroqProvider::from_config(config)?;
        Ok(Arc::new(provider))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", GROQ_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Groq API key required: set 'api_key' in config or {} env",
                GROQ_API_KEY_ENV
            )));
        }

        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "model": "llama-3.3-70b-versatile"
        })
    }

    fn description(&self) -> &'static str {
        "Groq OpenAI-compatible provider for chat answers"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = GroqProvider::new("test-key");
        assert_eq!(provider.name(), "groq");
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::system("sys"), ChatMessage::user("hi")];
        let request = ChatCompletionRequest {
            model: "llama-3.3-70b-versatile",
            messages: &messages,
            temperature: 0.7,
            max_tokens: 1024,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama-3.3-70b-versatile");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 1024);
    }

    #[test]
    fn test_into_completion_trims_first_choice() {
        let body: ChatCompletionResponse = serde_json::from_str(
            r#"{
                "model": "llama-3.3-70b-versatile",
                "choices": [
                    {"message": {"role": "assistant", "content": "  Drink water.  "}, "finish_reason": "stop"},
                    {"message": {"role": "assistant", "content": "ignored"}}
                ],
                "usage": {"prompt_tokens": 20, "completion_tokens": 4}
            }"#,
        )
        .unwrap();

        let completion = into_completion(body, "fallback-model");
        assert_eq!(completion.content, "Drink water.");
        assert_eq!(completion.stop_reason.as_deref(), Some("stop"));
        assert_eq!(completion.usage.total(), 24);
        assert_eq!(completion.model, "llama-3.3-70b-versatile");
    }

    #[test]
    fn test_into_completion_without_choices() {
        let body: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let completion = into_completion(body, "requested");
        assert!(completion.content.is_empty());
        assert_eq!(completion.model, "requested");
    }

    #[test]
    fn test_factory_requires_key() {
        let factory = GroqProviderFactory;
        let config = serde_json::json!({ "api_key": "your_groq_api_key_here" });
        // Placeholder in config; the real env var may or may not be set on the host
        if std::env::var(GROQ_API_KEY_ENV).is_err() {
            assert!(factory.validate_config(&config).is_err());
        }
        assert!(factory.validate_config(&serde_json::json!({ "api_key": "gsk_real" })).is_ok());
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "gsk-super-secret-key-12345";
        let provider = GroqProvider::new(secret_key);

        let debug_output = format!("{:?}", provider);
        assert!(!debug_output.contains(secret_key));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
