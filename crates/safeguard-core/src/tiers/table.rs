//! Tier table parsing from YAML/JSON and URL classification.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::types::{SearchHit, SourceRecord};

use super::schema::validate_tier_table_schema;
use super::Tier;

/// The built-in tier table.
pub const DEFAULT_TIER_TABLE_YAML: &str = include_str!("default_tiers.yaml");

lazy_static! {
    static ref BUILTIN_TABLE: TierTable =
        TierTable::from_yaml(DEFAULT_TIER_TABLE_YAML).expect("embedded tier table is valid");
}

/// Errors that can occur when loading a tier table.
#[derive(Error, Debug)]
pub enum TierTableError {
    #[error("Failed to read tier table file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Tier table does not match schema: {}", .0.join("; "))]
    SchemaViolation(Vec<String>),

    #[error("Tier table validation failed: {0}")]
    ValidationError(String),
}

/// Domains belonging to one of tiers 1-4.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierRule {
    pub tier: Tier,

    /// Tier name reported on each classified source (e.g. "government_who")
    pub label: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Confidence score assigned to sources in this tier (0-100)
    pub confidence: u8,

    /// Substrings matched against the lowercased source URL
    pub domains: Vec<String>,
}

/// The implicit catch-all tier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UntrustedRule {
    #[serde(default = "default_untrusted_label")]
    pub label: String,

    pub confidence: u8,
}

fn default_untrusted_label() -> String {
    "untrusted".to_string()
}

/// Read-only mapping from source URLs to credibility tiers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierTable {
    pub table_version: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Tiers 1-4, kept sorted by tier after loading
    pub tiers: Vec<TierRule>,

    pub untrusted: UntrustedRule,
}

impl TierTable {
    /// The embedded default table.
    pub fn builtin() -> &'static TierTable {
        &BUILTIN_TABLE
    }

    /// Parse a tier table from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, TierTableError> {
        let value: serde_json::Value = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse a tier table from JSON string.
    pub fn from_json(json: &str) -> Result<Self, TierTableError> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Load a tier table file. `.json` files are parsed as JSON, anything else as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TierTableError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json(&contents)
        } else {
            Self::from_yaml(&contents)
        }
    }

    fn from_value(value: serde_json::Value) -> Result<Self, TierTableError> {
        validate_tier_table_schema(&value).map_err(TierTableError::SchemaViolation)?;

        let mut table: TierTable = serde_json::from_value(value)?;
        table.validate()?;
        table.tiers.sort_by_key(|rule| rule.tier);

        tracing::debug!(
            version = %table.table_version,
            domains = table.tiers.iter().map(|t| t.domains.len()).sum::<usize>(),
            "Tier table loaded"
        );

        Ok(table)
    }

    /// Each of tiers 1-4 must appear exactly once.
    fn validate(&self) -> Result<(), TierTableError> {
        let mut seen = std::collections::BTreeSet::new();

        for rule in &self.tiers {
            if rule.tier == Tier::Untrusted {
                return Err(TierTableError::ValidationError(
                    "tier 5 is implicit and cannot list domains".to_string(),
                ));
            }
            if !seen.insert(rule.tier) {
                return Err(TierTableError::ValidationError(format!(
                    "Duplicate entry for {}",
                    rule.tier
                )));
            }
            if rule.domains.iter().any(|d| d.trim().is_empty()) {
                return Err(TierTableError::ValidationError(format!(
                    "Empty domain in {}",
                    rule.tier
                )));
            }
        }

        if seen.len() != 4 {
            return Err(TierTableError::ValidationError(
                "tiers 1 through 4 must all be defined".to_string(),
            ));
        }

        Ok(())
    }

    /// Classify a URL. Tiers are tested in order 1 to 4 and the first match
    /// wins; unmatched URLs are untrusted.
    pub fn classify(&self, url: &str) -> (Tier, u8) {
        let url = url.to_ascii_lowercase();

        self.tiers
            .iter()
            .find(|rule| rule.domains.iter().any(|domain| url.contains(domain.as_str())))
            .map(|rule| (rule.tier, rule.confidence))
            .unwrap_or((Tier::Untrusted, self.untrusted.confidence))
    }

    /// Classify a search hit into a source record.
    pub fn classify_hit(&self, hit: &SearchHit) -> SourceRecord {
        let (tier, confidence) = self.classify(&hit.link);
        SourceRecord {
            url: hit.link.clone(),
            title: hit.title.clone(),
            tier,
            label: self.label(tier).to_string(),
            confidence,
        }
    }

    /// Configured label for a tier.
    pub fn label(&self, tier: Tier) -> &str {
        if tier == Tier::Untrusted {
            return &self.untrusted.label;
        }
        self.tiers
            .iter()
            .find(|rule| rule.tier == tier)
            .map(|rule| rule.label.as_str())
            .unwrap_or("unknown")
    }
}

impl Default for TierTable {
    fn default() -> Self {
        Self::builtin().clone()
    }
}
