//! API keys for the search and text-generation backends.
//!
//! Keys come from the backend's JSON settings first and the environment
//! second. Values copied unchanged from `.env.example`, such as
//! `your_google_api_key_here`, are treated as absent so a half-filled
//! environment disables the backend instead of producing auth failures.
//!
//! An [`ApiCredential`] never prints its value. Call [`ApiCredential::expose`]
//! only where the key goes onto the wire.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

use super::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Config,
    Environment,
    /// Passed directly to a constructor, e.g. in tests.
    Programmatic,
}

impl CredentialSource {
    fn as_str(self) -> &'static str {
        match self {
            CredentialSource::Config => "config",
            CredentialSource::Environment => "environment",
            CredentialSource::Programmatic => "programmatic",
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// True for blank values and `your_..._here` template values.
pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || (value.starts_with("your_") && value.ends_with("_here"))
}

/// Where to look for one key: a settings field, then an environment variable.
#[derive(Debug, Clone, Copy)]
struct Lookup {
    config_key: &'static str,
    env_var: &'static str,
    label: &'static str,
}

impl Lookup {
    fn resolve(&self, config: &JsonValue) -> Option<(String, CredentialSource)> {
        let from_config = config
            .get(self.config_key)
            .and_then(JsonValue::as_str)
            .filter(|value| !is_placeholder(value))
            .map(|value| (value.to_string(), CredentialSource::Config));

        from_config.or_else(|| {
            std::env::var(self.env_var)
                .ok()
                .filter(|value| !is_placeholder(value))
                .map(|value| (value, CredentialSource::Environment))
        })
    }

    fn load(&self, config: &JsonValue) -> Result<ApiCredential, ProviderError> {
        let (value, source) = self.resolve(config).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "missing {}: set '{}' in settings or the {} variable",
                self.label, self.config_key, self.env_var
            ))
        })?;
        Ok(ApiCredential::new(value, source, self.label))
    }
}

/// A key held in a [`SecretString`]. `Debug` and `Display` print `[REDACTED]`.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Read the key from `env_var` only.
    pub fn from_env(env_var: &'static str, name: &'static str) -> Result<Self, ProviderError> {
        std::env::var(env_var)
            .ok()
            .filter(|value| !is_placeholder(value))
            .map(|value| Self::new(value, CredentialSource::Environment, name))
            .ok_or_else(|| ProviderError::NotConfigured(format!("missing {name}: set {env_var}")))
    }

    /// Read `config[config_key]`, falling back to `env_var`.
    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &'static str,
        env_var: &'static str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        Lookup {
            config_key,
            env_var,
            label: name,
        }
        .load(config)
    }

    /// Whether a usable key exists, without keeping it.
    pub fn is_available(
        config: &JsonValue,
        config_key: &'static str,
        env_var: &'static str,
    ) -> bool {
        Lookup {
            config_key,
            env_var,
            label: "",
        }
        .resolve(config)
        .is_some()
    }

    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): [REDACTED]", self.name, self.source)
    }
}

/// Loads several keys at once, some mandatory and some not.
///
/// Google search needs an API key and an engine id, and may carry a backup
/// pair for when the primary quota runs out:
///
/// ```ignore
/// let credentials = CredentialBuilder::new()
///     .require("api_key", "GOOGLE_SEARCH_API_KEY", "Google Search API key")
///     .require("cx", "GOOGLE_SEARCH_CX", "Google search engine id")
///     .optional("backup_api_key", "GOOGLE_SEARCH_API_KEY_BACKUP", "backup key")
///     .build(&settings)?;
/// ```
#[derive(Default)]
pub struct CredentialBuilder {
    lookups: Vec<(Lookup, bool)>,
}

impl CredentialBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(
        self,
        config_key: &'static str,
        env_var: &'static str,
        name: &'static str,
    ) -> Self {
        self.push(config_key, env_var, name, true)
    }

    pub fn optional(
        self,
        config_key: &'static str,
        env_var: &'static str,
        name: &'static str,
    ) -> Self {
        self.push(config_key, env_var, name, false)
    }

    fn push(
        mut self,
        config_key: &'static str,
        env_var: &'static str,
        label: &'static str,
        required: bool,
    ) -> Self {
        let lookup = Lookup {
            config_key,
            env_var,
            label,
        };
        self.lookups.push((lookup, required));
        self
    }

    /// True when every required key can be found.
    pub fn is_satisfied(&self, config: &JsonValue) -> bool {
        self.lookups
            .iter()
            .filter(|(_, required)| *required)
            .all(|(lookup, _)| lookup.resolve(config).is_some())
    }

    /// Fails on the first missing required key. Missing optional keys are skipped.
    pub fn build(self, config: &JsonValue) -> Result<CredentialSet, ProviderError> {
        let mut credentials = BTreeMap::new();
        for (lookup, required) in self.lookups {
            match lookup.load(config) {
                Ok(credential) => {
                    credentials.insert(lookup.config_key, credential);
                }
                Err(e) if required => return Err(e),
                Err(_) => {}
            }
        }
        Ok(CredentialSet { credentials })
    }
}

/// Keys loaded by a [`CredentialBuilder`], addressed by settings field name.
pub struct CredentialSet {
    credentials: BTreeMap<&'static str, ApiCredential>,
}

impl CredentialSet {
    pub fn get(&self, key: &str) -> Result<&ApiCredential, ProviderError> {
        self.get_optional(key)
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!("no credential loaded for '{key}'"))
            })
    }

    pub fn get_optional(&self, key: &str) -> Option<&ApiCredential> {
        self.credentials.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.credentials.contains_key(key)
    }
}

impl fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.credentials.keys()).finish()
    }
}
