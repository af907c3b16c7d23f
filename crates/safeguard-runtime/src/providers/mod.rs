//! Text-generation backends.
//!
//! Gemini writes decision explanations and Groq answers chat questions. Both
//! sit behind [`LlmProvider`] so tests and the pipeline can swap them out.
//! API keys are held as [`ApiCredential`] and never printed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

mod factory;
mod gemini;
mod groq;
pub mod secrets;

pub use factory::{ProviderFactory, ProviderRegistry};
pub use gemini::{GeminiProvider, GeminiProviderFactory, GEMINI_API_KEY_ENV};
pub use groq::{GroqProvider, GroqProviderFactory, GROQ_API_KEY_ENV};
pub use secrets::{ApiCredential, CredentialBuilder, CredentialSet, CredentialSource};

/// Why a generation call produced no usable text.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request to model backend failed: {0}")]
    HttpError(String),

    #[error("model backend rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("model backend returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("unreadable model response: {0}")]
    ParseError(String),

    #[error("model backend rejected the API key")]
    AuthError,

    #[error("no model response within {0:?}")]
    Timeout(Duration),

    #[error("model backend unavailable: {0}")]
    NotConfigured(String),

    #[error("model backend returned no text")]
    EmptyResponse,
}

/// Per-call generation settings. The defaults suit short explanations.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound on the whole call, enforced by the caller.
    pub timeout: Duration,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: "gemini-1.5-flash".to_string(),
            max_tokens: 256,
            temperature: 0.2,
            timeout: Duration::from_secs(10),
        }
    }
}

/// One turn of a prompt. `role` is `system`, `user` or `assistant`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    fn with_role(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role("assistant", content)
    }
}

/// Text produced by a backend, plus what it reported about the call.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub usage: TokenUsage,
    /// Model that actually answered; may differ from the requested one.
    pub model: String,
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// A backend that turns a prompt into text.
///
/// Nothing downstream depends on a call succeeding. The explainer swaps in
/// fixed text on any error and chat mode reports the error before screening.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError>;

    /// Cheap local readiness check; no network call.
    async fn health_check(&self) -> bool;

    /// Short backend name used in logs and `generated_by`.
    fn name(&self) -> &str;
}

/// Client shared by every network backend, search included.
#[cfg(any(feature = "gemini", feature = "groq", feature = "google", feature = "duckduckgo"))]
pub(crate) fn http_client() -> &'static reqwest::Client {
    static CLIENT: std::sync::OnceLock<reqwest::Client> = std::sync::OnceLock::new();
    CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}
