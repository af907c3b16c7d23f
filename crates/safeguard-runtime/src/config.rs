//! Runtime configuration.
//!
//! Loaded from YAML, then overridden by `SAFEGUARD_*` environment variables.
//! Every field has a default, so an empty file is a valid configuration.
//!
//! ```yaml
//! search:
//!   providers: [google, duckduckgo]
//!   timeout: 10s
//!   policy: standard
//! explanation:
//!   provider: gemini
//!   timeout: 8s
//! chat:
//!   provider: groq
//!   model: llama-3.3-70b-versatile
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use safeguard_core::AggregationPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::providers::CompletionConfig;

/// Search backends the runtime knows how to build.
pub const KNOWN_SEARCH_PROVIDERS: [&str; 2] = ["google", "duckduckgo"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub search: SearchConfig,
    pub explanation: ExplanationConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Backends in fallback order.
    pub providers: Vec<String>,

    /// Per-attempt timeout.
    #[serde(with = "duration_str")]
    pub timeout: Duration,

    pub results_per_query: usize,

    /// Look up claims concurrently.
    pub concurrent_lookups: bool,

    pub policy: AggregationPolicy,

    /// Custom tier table (YAML or JSON). The built-in table is used when unset.
    pub tier_table: Option<PathBuf>,

    /// Google credentials and endpoint, see `GoogleSearchProvider::from_config`.
    pub google: JsonValue,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            providers: KNOWN_SEARCH_PROVIDERS.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(10),
            results_per_query: 10,
            concurrent_lookups: false,
            policy: AggregationPolicy::Standard,
            tier_table: None,
            google: JsonValue::Object(Default::default()),
        }
    }
}

/// Settings for the explanation provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplanationConfig {
    /// Provider type name; `None` means always use the fallback table.
    pub provider: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(with = "duration_str")]
    pub timeout: Duration,
    /// Provider-specific settings (`api_key`, `base_url`).
    pub settings: JsonValue,
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            provider: Some("gemini".to_string()),
            model: "gemini-1.5-flash".to_string(),
            temperature: 0.2,
            max_tokens: 256,
            timeout: Duration::from_secs(10),
            settings: JsonValue::Object(Default::default()),
        }
    }
}

impl ExplanationConfig {
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
        }
    }
}

/// Settings for the chat-mode answer provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Provider type name; `None` disables chat mode.
    pub provider: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(with = "duration_str")]
    pub timeout: Duration,
    pub settings: JsonValue,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: Some("groq".to_string()),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            timeout: Duration::from_secs(30),
            settings: JsonValue::Object(Default::default()),
        }
    }
}

impl ChatConfig {
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
        }
    }
}

impl RuntimeConfig {
    /// Parse from YAML and validate. Environment overrides are not applied.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file, apply environment overrides, then validate.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&yaml)?
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `SAFEGUARD_*` environment variables.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(providers) = get_var("SAFEGUARD_SEARCH_PROVIDERS") {
            self.search.providers = providers
                .split(',')
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect();
        }
        if let Some(timeout) = get_var("SAFEGUARD_SEARCH_TIMEOUT") {
            self.search.timeout = parse_duration("SAFEGUARD_SEARCH_TIMEOUT", &timeout)?;
        }
        if let Some(policy) = get_var("SAFEGUARD_AGGREGATION_POLICY") {
            self.search.policy = match policy.to_lowercase().as_str() {
                "standard" => AggregationPolicy::Standard,
                "strict" => AggregationPolicy::Strict,
                other => {
                    return Err(ConfigError::invalid(
                        "SAFEGUARD_AGGREGATION_POLICY",
                        format!("expected 'standard' or 'strict', got '{other}'"),
                    ))
                }
            };
        }
        if let Some(flag) = get_var("SAFEGUARD_CONCURRENT_LOOKUPS") {
            self.search.concurrent_lookups = parse_bool("SAFEGUARD_CONCURRENT_LOOKUPS", &flag)?;
        }
        if let Some(path) = get_var("SAFEGUARD_TIER_TABLE") {
            self.search.tier_table = Some(PathBuf::from(path));
        }
        if let Some(model) = get_var("SAFEGUARD_EXPLANATION_MODEL") {
            self.explanation.model = model;
        }
        if let Some(timeout) = get_var("SAFEGUARD_EXPLANATION_TIMEOUT") {
            self.explanation.timeout = parse_duration("SAFEGUARD_EXPLANATION_TIMEOUT", &timeout)?;
        }
        if let Some(model) = get_var("SAFEGUARD_CHAT_MODEL") {
            self.chat.model = model;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for provider in &self.search.providers {
            if !KNOWN_SEARCH_PROVIDERS.contains(&provider.as_str()) {
                return Err(ConfigError::invalid(
                    "search.providers",
                    format!("unknown search provider '{provider}'"),
                ));
            }
        }
        if self.search.results_per_query == 0 {
            return Err(ConfigError::invalid("search.results_per_query", "must be at least 1"));
        }
        for (key, timeout) in [
            ("search.timeout", self.search.timeout),
            ("explanation.timeout", self.explanation.timeout),
            ("chat.timeout", self.chat.timeout),
        ] {
            if timeout.is_zero() {
                return Err(ConfigError::invalid(key, "must be greater than zero"));
            }
        }
        for (key, temperature) in [
            ("explanation.temperature", self.explanation.temperature),
            ("chat.temperature", self.chat.temperature),
        ] {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::invalid(key, "must be between 0.0 and 2.0"));
            }
        }
        Ok(())
    }
}

/// Read a variable, treating empty values as unset.
fn get_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(value.trim()).map_err(|e| ConfigError::invalid(key, e.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(key, format!("expected a boolean, got '{other}'"))),
    }
}

/// Durations as human-readable strings ("10s", "1m 30s").
mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let value = String::deserialize(deserializer)?;
        humantime::parse_duration(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.search.providers, vec!["google", "duckduckgo"]);
        assert_eq!(config.search.results_per_query, 10);
        assert_eq!(config.explanation.provider.as_deref(), Some("gemini"));
        assert_eq!(config.chat.model, "llama-3.3-70b-versatile");
        assert_eq!(config.chat.max_tokens, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(RuntimeConfig::from_yaml("").unwrap(), RuntimeConfig::default());
    }

    #[test]
    fn test_partial_yaml_keeps_section_defaults() {
        let config = RuntimeConfig::from_yaml(
            r#"
search:
  providers: [duckduckgo]
  timeout: 2s 500ms
  policy: strict
chat:
  temperature: 0.3
"#,
        )
        .unwrap();

        assert_eq!(config.search.providers, vec!["duckduckgo"]);
        assert_eq!(config.search.timeout, Duration::from_millis(2500));
        assert_eq!(config.search.policy, AggregationPolicy::Strict);
        assert_eq!(config.search.results_per_query, 10);
        assert_eq!(config.chat.model, "llama-3.3-70b-versatile");
        assert_eq!(config.chat.temperature, 0.3);
        assert_eq!(config.explanation.model, "gemini-1.5-flash");
    }

    #[test]
    fn test_null_provider_disables() {
        let config = RuntimeConfig::from_yaml("explanation:\n  provider: null\n").unwrap();
        assert!(config.explanation.provider.is_none());
    }

    #[test]
    fn test_rejects_unknown_search_provider() {
        let err = RuntimeConfig::from_yaml("search:\n  providers: [bing]\n").unwrap_err();
        assert!(err.to_string().contains("bing"));
    }

    #[test]
    fn test_rejects_bad_duration() {
        assert!(RuntimeConfig::from_yaml("search:\n  timeout: soon\n").is_err());
    }

    #[test]
    fn test_rejects_zero_results() {
        assert!(RuntimeConfig::from_yaml("search:\n  results_per_query: 0\n").is_err());
    }

    #[test]
    fn test_completion_config_mapping() {
        let chat = ChatConfig::default().completion_config();
        assert_eq!(chat.model, "llama-3.3-70b-versatile");
        assert_eq!(chat.max_tokens, 1024);
        assert!((chat.temperature - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        std::env::set_var("SAFEGUARD_SEARCH_PROVIDERS", "duckduckgo, google");
        std::env::set_var("SAFEGUARD_SEARCH_TIMEOUT", "3s");
        std::env::set_var("SAFEGUARD_AGGREGATION_POLICY", "STRICT");
        std::env::set_var("SAFEGUARD_CONCURRENT_LOOKUPS", "yes");

        let config = RuntimeConfig::from_env().expect("should parse config");
        assert_eq!(config.search.providers, vec!["duckduckgo", "google"]);
        assert_eq!(config.search.timeout, Duration::from_secs(3));
        assert_eq!(config.search.policy, AggregationPolicy::Strict);
        assert!(config.search.concurrent_lookups);

        std::env::remove_var("SAFEGUARD_SEARCH_PROVIDERS");
        std::env::remove_var("SAFEGUARD_SEARCH_TIMEOUT");
        std::env::remove_var("SAFEGUARD_AGGREGATION_POLICY");
        std::env::remove_var("SAFEGUARD_CONCURRENT_LOOKUPS");
    }

    #[test]
    fn test_env_bad_policy() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        std::env::set_var("SAFEGUARD_AGGREGATION_POLICY", "lenient");
        let result = RuntimeConfig::from_env();
        std::env::remove_var("SAFEGUARD_AGGREGATION_POLICY");

        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
