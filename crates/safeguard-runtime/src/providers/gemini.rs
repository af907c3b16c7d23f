//! Google Gemini provider implementation.
//!
//! Used for decision explanations. Talks to the `generateContent` endpoint of
//! the Generative Language API.
//!
//! ## Security
//!
//! The API key is held in an [`ApiCredential`] and only exposed when the
//! request URL is built.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Environment variable name for the Gemini API key.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini provider.
pub struct GeminiProvider {
    credential: ApiCredential,
    base_url: String,
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiProvider {
    /// Create a new Gemini provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                "Gemini API key",
            ),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from the `GEMINI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_env(GEMINI_API_KEY_ENV, "Gemini API key")?;
        Ok(Self {
            credential,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Create from JSON configuration with environment fallback.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            GEMINI_API_KEY_ENV,
            "Gemini API key",
        )?;

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

    /// Set custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// Gemini API request format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

/// Gemini API response format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

/// Split chat messages into Gemini's system instruction and contents.
fn build_request(messages: Vec<ChatMessage>, config: &CompletionConfig) -> GenerateContentRequest {
    let mut system = Vec::new();
    let mut contents = Vec::new();

    for msg in messages {
        let part = Part {
            text: Some(msg.content),
        };
        match msg.role.as_str() {
            "system" => system.push(part),
            "assistant" => contents.push(Content {
                role: Some("model".to_string()),
                parts: vec![part],
            }),
            _ => contents.push(Content {
                role: Some("user".to_string()),
                parts: vec![part],
            }),
        }
    }

    GenerateContentRequest {
        contents,
        system_instruction: if system.is_empty() {
            None
        } else {
            Some(Content {
                role: None,
                parts: system,
            })
        },
        generation_config: GenerationConfig {
            temperature: config.temperature,
            max_output_tokens: config.max_tokens,
        },
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: &GenerateContentResponse) -> String {
    response
        .candidates
        .first()
        .and_then(|candidate| candidate.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|part| part.text.as_deref())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    #[cfg(feature = "gemini")]
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        use std::time::Duration;

        let client = super::http_client();
        let request = build_request(messages, config);

        let response = client
            .post(format!("{}/models/{}:generateContent", self.base_url, config.model))
            // SECURITY: Only expose the credential here, at the point of use
            .query(&[("key", self.credential.expose())])
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    // Strip the URL: it carries the key as a query parameter
                    ProviderError::HttpError(e.without_url().to_string())
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

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthError);
        }

        if !status.is_success() {
            let message = response
                .json::<GeminiError>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|e| e.without_url().to_string());

            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.without_url().to_string()))?;

        let content = extract_text(&body);
        let usage = body
            .usage_metadata
            .as_ref()
            .map(|u| super::TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(CompletionResponse {
            content,
            usage,
            model: config.model.clone(),
            stop_reason: body.candidates.first().and_then(|c| c.finish_reason.clone()),
        })
    }

    #[cfg(not(feature = "gemini"))]
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        Err(ProviderError::NotConfigured(
            "Gemini provider requires 'gemini' feature".to_string(),
        ))
    }

    async fn health_check(&self) -> bool {
        !self.credential.is_empty()
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Factory for creating Gemini providers from configuration.
///
/// ## Configuration Format
/// ```json
/// {
///   "api_key": "...",            // Optional, falls back to GEMINI_API_KEY env
///   "base_url": "https://..."    // Optional, custom API endpoint
/// }
/// ```
pub struct GeminiProviderFactory;

impl ProviderFactory for GeminiProviderFactory {
    fn provider_type(&self) -> &'static str {
        "gemini"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let provider = GeminiProvider::from_config(config)?;
        Ok(Arc::new(provider))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", GEMINI_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Gemini API key required: set 'api_key' in config or {} env",
                GEMINI_API_KEY_ENV
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
            "model": "gemini-1.5-flash"
        })
    }

    fn description(&self) -> &'static str {
        "Google Gemini provider for decision explanations"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = GeminiProvider::new("test-key");
        assert_eq!(provider.name(), "gemini");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_system_messages_become_instruction() {
        let request = build_request(
            vec![
                ChatMessage::system("rules"),
                ChatMessage::user("question"),
                ChatMessage::assistant("answer"),
            ],
            &CompletionConfig::default(),
        );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "rules");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][1]["role"], "model");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 256);
    }

    #[test]
    fn test_no_system_instruction_when_absent() {
        let request = build_request(vec![ChatMessage::user("q")], &CompletionConfig::default());
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let body: GenerateContentResponse = serde_json::from_str(
            r#"{
                "candidates": [
                    {"content": {"role": "model", "parts": [{"text": "Hello "}, {"text": "there."}]},
                     "finishReason": "STOP"}
                ],
                "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 3}
            }"#,
        )
        .unwrap();

        assert_eq!(extract_text(&body), "Hello there.");
        assert_eq!(body.usage_metadata.unwrap().prompt_token_count, 12);
    }

    #[test]
    fn test_extract_text_without_candidates_is_empty() {
        let body: GenerateContentResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert_eq!(extract_text(&body), "");
    }

    #[test]
    fn test_factory_validate_invalid_base_url() {
        let factory = GeminiProviderFactory;
        let config = serde_json::json!({
            "api_key": "test-key",
            "base_url": "invalid-url"
        });
        assert!(factory.validate_config(&config).is_err());
    }

    #[test]
    fn test_factory_create_with_api_key() {
        let factory = GeminiProviderFactory;
        let provider = factory.create(&serde_json::json!({ "api_key": "test-api-key" }));
        assert_eq!(provider.unwrap().name(), "gemini");
        assert_eq!(factory.default_config()["model"], "gemini-1.5-flash");
    }

    #[test]
    fn test_from_config_custom_base_url() {
        let config = serde_json::json!({
            "api_key": "config-api-key",
            "base_url": "https://proxy.example.com/v1beta/"
        });

        let provider = GeminiProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url, "https://proxy.example.com/v1beta");
        assert_eq!(provider.credential.source(), CredentialSource::Config);
    }

    #[test]
    fn test_api_key_not_in_debug_output() {
        let secret_key = "AIza-super-secret-key-12345";
        let provider = GeminiProvider::new(secret_key);

        let debug_output = format!("{:?}", provider);
        assert!(!debug_output.contains(secret_key));
        assert!(debug_output.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_health_check_requires_key() {
        assert!(GeminiProvider::new("key").health_check().await);
        assert!(!GeminiProvider::new("").health_check().await);
    }
}
