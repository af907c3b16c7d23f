//! Core types for SAFEGUARD-Health classification.
//!
//! These types are shared between the deterministic pipeline stages and the
//! async runtime. Wire names follow the public API: request keys are
//! camelCase (`userContext`, `imageData`), response keys are snake_case and
//! enum values are SCREAMING_SNAKE_CASE.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::tiers::Tier;

/// Caller-supplied patient context.
///
/// Only key presence matters; values are carried through untouched.
pub type UserContext = BTreeMap<String, serde_json::Value>;

/// A single extracted candidate claim sentence.
pub type Claim = String;

/// Marker used in [`ExplanationResult::generated_by`] when the static table was used.
pub const GENERATED_BY_FALLBACK: &str = "fallback";

// ============================================================================
// Rule filter output
// ============================================================================

/// Placeholder image signal. Only populated when an image payload is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    #[default]
    Unknown,
    Low,
    Acceptable,
}

/// Flags raised by the rule filter.
///
/// The hard-block indicator is derived from the four `contains_*` flags, so a
/// set content flag always implies a hard block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFlags {
    pub missing_user_information: bool,
    pub contains_dosage: bool,
    pub contains_treatment: bool,
    pub contains_diagnosis: bool,
    pub contains_emergency: bool,
    pub image_quality: ImageQuality,
}

impl RuleFlags {
    /// True when any hard-safety pattern matched.
    pub fn is_hard_block(&self) -> bool {
        self.contains_dosage
            || self.contains_treatment
            || self.contains_diagnosis
            || self.contains_emergency
    }
}

// ============================================================================
// Evidence
// ============================================================================

/// A raw search hit as returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub link: String,
    pub title: String,
}

impl SearchHit {
    pub fn new(link: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            title: title.into(),
        }
    }
}

/// A search hit after tier classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub url: String,
    pub title: String,
    pub tier: Tier,
    /// The tier's label in the table that classified this source.
    #[serde(default)]
    pub label: String,
    /// Credibility score, 0-100.
    pub confidence: u8,
}

/// Categorical verdict on how well a claim is corroborated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceStatus {
    StrongSupport,
    PartialSupport,
    Conflicting,
    NoSupport,
}

impl EvidenceStatus {
    /// Whether this status counts as support for the ALLOW rule.
    pub fn is_supportive(&self) -> bool {
        matches!(self, EvidenceStatus::StrongSupport | EvidenceStatus::PartialSupport)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceStatus::StrongSupport => "STRONG_SUPPORT",
            EvidenceStatus::PartialSupport => "PARTIAL_SUPPORT",
            EvidenceStatus::Conflicting => "CONFLICTING",
            EvidenceStatus::NoSupport => "NO_SUPPORT",
        }
    }
}

impl fmt::Display for EvidenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordinal confidence attached to an evidence status (lowest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    #[serde(rename = "NONE")]
    None,
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "LOW-MEDIUM")]
    LowMedium,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "MEDIUM-HIGH")]
    MediumHigh,
    #[serde(rename = "HIGH")]
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::None => "NONE",
            ConfidenceLevel::Low => "LOW",
            ConfidenceLevel::LowMedium => "LOW-MEDIUM",
            ConfidenceLevel::Medium => "MEDIUM",
            ConfidenceLevel::MediumHigh => "MEDIUM-HIGH",
            ConfidenceLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of sources found in each tier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBreakdown {
    pub government_who: usize,
    pub peer_reviewed_medical: usize,
    pub credible_health_info: usize,
    pub general_educational: usize,
    pub untrusted: usize,
}

impl TierBreakdown {
    /// Count for a single tier.
    pub fn count(&self, tier: Tier) -> usize {
        match tier {
            Tier::Authority => self.government_who,
            Tier::PeerReviewed => self.peer_reviewed_medical,
            Tier::PatientInformation => self.credible_health_info,
            Tier::GeneralEducational => self.general_educational,
            Tier::Untrusted => self.untrusted,
        }
    }

    /// Increment the counter for `tier`.
    pub fn record(&mut self, tier: Tier) {
        match tier {
            Tier::Authority => self.government_who += 1,
            Tier::PeerReviewed => self.peer_reviewed_medical += 1,
            Tier::PatientInformation => self.credible_health_info += 1,
            Tier::GeneralEducational => self.general_educational += 1,
            Tier::Untrusted => self.untrusted += 1,
        }
    }

    /// Sources from tiers 1 through 4.
    pub fn trusted(&self) -> usize {
        self.government_who
            + self.peer_reviewed_medical
            + self.credible_health_info
            + self.general_educational
    }

    pub fn total(&self) -> usize {
        self.trusted() + self.untrusted
    }
}

/// Per-claim evidence verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceAssessment {
    pub claim: Claim,
    pub evidence_status: EvidenceStatus,
    pub confidence_level: ConfidenceLevel,
    pub trusted_sources_found: usize,
    /// Up to 3 tier-1 sources, best first.
    pub tier1_sources: Vec<SourceRecord>,
    /// Up to 2 tier-2 sources.
    pub tier2_sources: Vec<SourceRecord>,
    /// Up to 2 tier-3 sources.
    pub tier3_sources: Vec<SourceRecord>,
    pub tier_breakdown: TierBreakdown,
    pub total_results: usize,
    /// Set when no live search succeeded and defaults were used.
    #[serde(default)]
    pub fallback_applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Decision
// ============================================================================

/// Final moderation outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionKind {
    Refuse,
    AskMoreInfo,
    Escalate,
    Allow,
    AllowWithWarning,
}

impl DecisionKind {
    /// Outcomes under which content may be shown to the end user.
    pub fn is_safe(&self) -> bool {
        matches!(self, DecisionKind::Allow | DecisionKind::AllowWithWarning)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Refuse => "REFUSE",
            DecisionKind::AskMoreInfo => "ASK_MORE_INFO",
            DecisionKind::Escalate => "ESCALATE",
            DecisionKind::Allow => "ALLOW",
            DecisionKind::AllowWithWarning => "ALLOW_WITH_WARNING",
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        })
    }
}

/// The single verdict produced for a classification request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub decision: DecisionKind,
    pub reason: String,
    pub severity: Severity,
}

/// User-facing explanation of a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplanationResult {
    pub explanation: String,
    /// Provider model name, or `"fallback"`.
    pub generated_by: String,
}

impl ExplanationResult {
    pub fn is_fallback(&self) -> bool {
        self.generated_by == GENERATED_BY_FALLBACK
    }
}

// ============================================================================
// Request / response
// ============================================================================

/// Inbound classification payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    #[serde(default)]
    pub content: String,

    #[serde(rename = "userContext", default)]
    pub user_context: UserContext,

    /// Opaque image payload, usually a base64 string. Any JSON value is
    /// accepted; only the length of a string payload is inspected.
    #[serde(rename = "imageData", default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<serde_json::Value>,
}

impl ClassificationRequest {
    /// Create a request for plain text with no context.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Attach a context key.
    pub fn with_context(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.user_context.insert(key.into(), value.into());
        self
    }

    /// Attach an image payload.
    pub fn with_image(mut self, image_data: impl Into<String>) -> Self {
        self.image_data = Some(serde_json::Value::String(image_data.into()));
        self
    }
}

/// Per-claim entry of the response's evidence summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSummary {
    pub claim: Claim,
    pub status: EvidenceStatus,
    pub confidence_level: ConfidenceLevel,
    pub tier1_sources: Vec<SourceRecord>,
    pub tier2_sources: Vec<SourceRecord>,
    pub tier3_sources: Vec<SourceRecord>,
    pub tier_breakdown: TierBreakdown,
    pub trusted_count: usize,
    pub fallback_applied: bool,
}

impl From<&EvidenceAssessment> for EvidenceSummary {
    fn from(assessment: &EvidenceAssessment) -> Self {
        Self {
            claim: assessment.claim.clone(),
            status: assessment.evidence_status,
            confidence_level: assessment.confidence_level,
            tier1_sources: assessment.tier1_sources.clone(),
            tier2_sources: assessment.tier2_sources.clone(),
            tier3_sources: assessment.tier3_sources.clone(),
            tier_breakdown: assessment.tier_breakdown,
            trusted_count: assessment.trusted_sources_found,
            fallback_applied: assessment.fallback_applied,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseDetails {
    pub rule_flags: RuleFlags,
    pub evidence_summary: Vec<EvidenceSummary>,
    pub decision_reason: String,
}

/// Outbound classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResponse {
    pub decision: DecisionKind,
    pub severity: Severity,
    pub explanation: String,
    pub generated_by: String,
    pub details: ResponseDetails,
    pub timestamp: DateTime<Utc>,
}

impl ClassificationResponse {
    /// Assemble the response from the outputs of every pipeline stage.
    pub fn assemble(
        decision: Decision,
        explanation: ExplanationResult,
        flags: RuleFlags,
        assessments: &[EvidenceAssessment],
    ) -> Self {
        Self {
            decision: decision.decision,
            severity: decision.severity,
            explanation: explanation.explanation,
            generated_by: explanation.generated_by,
            details: ResponseDetails {
                rule_flags: flags,
                evidence_summary: assessments.iter().map(EvidenceSummary::from).collect(),
                decision_reason: decision.reason,
            },
            timestamp: Utc::now(),
        }
    }
}
