//! Name-based construction of text-generation backends.
//!
//! Runtime config refers to backends by name (`gemini`, `groq`) and carries a
//! free-form JSON settings blob for each. A [`ProviderRegistry`] maps the name
//! to a [`ProviderFactory`] that checks the settings and builds the backend.
//!
//! ```ignore
//! let registry = ProviderRegistry::with_builtin();
//! let explainer = registry.create_validated("gemini", &settings)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{GeminiProviderFactory, GroqProviderFactory, LlmProvider, ProviderError};

/// Builds one kind of backend from its JSON settings.
pub trait ProviderFactory: Send + Sync {
    /// Name the backend is registered under.
    fn provider_type(&self) -> &'static str;

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Reject settings whose API key is missing or still a `your_*_here` placeholder.
    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError>;

    fn default_config(&self) -> JsonValue {
        JsonValue::Object(Default::default())
    }

    fn description(&self) -> &'static str {
        "text generation backend"
    }
}

/// Backend factories by name, iterated in name order.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<&'static str, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gemini and Groq. They are registered even when their cargo feature is
    /// off; the stub backends then fail every call with `NotConfigured`.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(GeminiProviderFactory));
        registry.register(Arc::new(GroqProviderFactory));
        registry
    }

    /// Add a factory. A later registration under the same name wins.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories.insert(factory.provider_type(), factory);
    }

    fn lookup(&self, name: &str) -> Result<&Arc<dyn ProviderFactory>, ProviderError> {
        self.factories.get(name).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "no backend named '{}' (known: {})",
                name,
                self.available_types().join(", ")
            ))
        })
    }

    pub fn create(
        &self,
        name: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.lookup(name)?.create(config)
    }

    pub fn validate(&self, name: &str, config: &JsonValue) -> Result<(), ProviderError> {
        self.lookup(name)?.validate_config(config)
    }

    /// Validate, then build. A missing key surfaces here so the caller can
    /// leave the backend out instead of failing on the first request.
    pub fn create_validated(
        &self,
        name: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let factory = self.lookup(name)?;
        factory.validate_config(config)?;
        factory.create(config)
    }

    pub fn available_types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn default_config(&self, name: &str) -> Option<JsonValue> {
        self.factories.get(name).map(|factory| factory.default_config())
    }

    /// `(name, description)` pairs in name order.
    pub fn describe(&self) -> Vec<(&'static str, &'static str)> {
        self.factories
            .iter()
            .map(|(name, factory)| (*name, factory.description()))
            .collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explainer::tests::MockLlm;
    use serde_json::json;

    /// Builds a canned-reply backend; settings `{"reject": true}` fail validation.
    struct CannedFactory;

    impl ProviderFactory for CannedFactory {
        fn provider_type(&self) -> &'static str {
            "canned"
        }

        fn create(&self, _config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
            Ok(Arc::new(MockLlm::Reply("canned")))
        }

        fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
            match config["reject"].as_bool() {
                Some(true) => Err(ProviderError::NotConfigured("canned key missing".into())),
                _ => Ok(()),
            }
        }
    }

    fn registry() -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(CannedFactory));
        registry
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = registry();
        assert!(registry.is_registered("canned"));
        assert!(!registry.is_registered("openai"));
        assert_eq!(registry.create("canned", &json!({})).unwrap().name(), "mock");
    }

    #[test]
    fn test_unknown_name_lists_known_backends() {
        let err = registry().create("openai", &json!({})).err().unwrap();
        match err {
            ProviderError::NotConfigured(msg) => {
                assert!(msg.contains("'openai'"));
                assert!(msg.contains("canned"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_create_validated_stops_on_rejected_settings() {
        let registry = registry();
        assert!(registry.create_validated("canned", &json!({"reject": true})).is_err());
        assert!(registry.create_validated("canned", &json!({})).is_ok());
        // plain create skips validation
        assert!(registry.create("canned", &json!({"reject": true})).is_ok());
    }

    #[test]
    fn test_builtin_backends() {
        let registry = ProviderRegistry::with_builtin();
        assert_eq!(registry.available_types(), ["gemini", "groq"]);
        assert_eq!(
            registry.default_config("groq").unwrap()["model"],
            "llama-3.3-70b-versatile"
        );
        assert_eq!(registry.describe().len(), 2);
        assert_eq!(format!("{registry:?}"), r#"["gemini", "groq"]"#);
    }
}
