//! # safeguard-runtime
//!
//! Network collaborators and the async orchestrator for SAFEGUARD-Health.
//!
//! `safeguard-core` decides; this crate gathers what the decision needs:
//! web search hits for each claim, an optional LLM-written explanation, and
//! in chat mode an LLM answer that is screened before it is shown.
//!
//! ## Important
//!
//! Nothing here can change a decision. Search failures degrade to NO_SUPPORT
//! with the fallback marker set; explanation failures degrade to fixed text.
//!
//! ## Features
//!
//! - `google`: Google Custom Search backend
//! - `duckduckgo`: DuckDuckGo HTML backend
//! - `gemini`: Gemini explanations
//! - `groq`: Groq chat answers
//! - `all-providers`: all of the above
//!
//! Without a backend's feature it still builds, but every call fails with a
//! not-configured error and the matching fallback applies.
//!
//! ## Example
//!
//! ```rust,ignore
//! use safeguard_runtime::{RuntimeConfig, SafetyPipelineBuilder};
//! use safeguard_core::ClassificationRequest;
//!
//! let config = RuntimeConfig::from_env()?;
//! let pipeline = SafetyPipelineBuilder::from_config(&config)?.build();
//!
//! let response = pipeline
//!     .classify(&ClassificationRequest::text("Vitamin D supplements improve bone health."))
//!     .await?;
//! println!("{} ({})", response.decision, response.severity);
//! ```

pub mod assessor;
pub mod config;
pub mod explainer;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod responder;
pub mod search;

pub use assessor::EvidenceAssessor;
pub use config::{ChatConfig, ConfigError, ExplanationConfig, RuntimeConfig, SearchConfig};
pub use explainer::Explainer;
pub use pipeline::{
    ChatResponse, HealthReport, PipelineError, ProviderStatus, SafetyPipeline,
    SafetyPipelineBuilder,
};
pub use providers::{
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
    ProviderRegistry,
};
pub use responder::ResponseGenerator;
pub use search::{
    create_search_provider, DuckDuckGoSearchProvider, GoogleSearchProvider, SearchError,
    SearchProvider,
};

/// Service name reported by `info`.
pub const SERVICE_NAME: &str = "SAFEGUARD-Health Backend";

/// Service version reported by `info`.
pub const SERVICE_VERSION: &str = "2.0.0";

