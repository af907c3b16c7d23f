//! # safeguard-core
//!
//! Deterministic content-safety classification for health-related text.
//!
//! This crate holds every stage of the SAFEGUARD-Health pipeline that does not
//! touch the network:
//! - the rule filter (hard-safety patterns and patient-context requirements),
//! - claim extraction,
//! - tier classification and evidence aggregation,
//! - the decision engine,
//! - the fallback explanation table.
//!
//! ## Key Guarantees
//!
//! 1. **Deterministic**: the same content, context and search hits always
//!    produce the same decision
//! 2. **No LLM calls**: all evaluation here is rule-based
//! 3. **Stateless**: only the tier table is long-lived, and it is read-only
//!
//! ## Example
//!
//! ```rust,ignore
//! use safeguard_core::{screen, ClassificationRequest, DecisionEngine};
//!
//! let request = ClassificationRequest::text("Take 400mg of ibuprofen every 6 hours.");
//! let screening = screen(&request)?;
//! let decision = DecisionEngine::new().decide(&screening.flags, &[]);
//! assert_eq!(decision.decision.as_str(), "REFUSE");
//! ```

pub mod claims;
pub mod decision;
pub mod evidence;
pub mod explanation;
pub mod rules;
pub mod tiers;
pub mod types;

// Re-export main types at crate root
pub use claims::{extract_claims, MAX_CLAIMS};
pub use decision::DecisionEngine;
pub use evidence::{
    aggregate, assess_hits, rank_sources, AggregationPolicy, SEARCH_UNAVAILABLE_NOTE,
};
pub use explanation::fallback_explanation;
pub use rules::{RuleFilter, REQUIRED_CONTEXT_KEYS};
pub use tiers::{Tier, TierTable, TierTableError};
pub use types::{
    Claim, ClassificationRequest, ClassificationResponse, ConfidenceLevel, Decision,
    DecisionKind, EvidenceAssessment, EvidenceStatus, EvidenceSummary, ExplanationResult,
    ImageQuality, ResponseDetails, RuleFlags, SearchHit, Severity, SourceRecord, TierBreakdown,
    UserContext, GENERATED_BY_FALLBACK,
};

use thiserror::Error;

/// Errors that can occur before the pipeline runs.
#[derive(Error, Debug)]
pub enum EvaluationError {
    #[error("No content provided")]
    EmptyContent,

    #[error("Tier table error: {0}")]
    TierTable(#[from] TierTableError),
}

/// Output of the synchronous screening stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screening {
    pub flags: RuleFlags,

    /// Claims to assess. Always empty when the rule filter hard-blocks.
    pub claims: Vec<Claim>,
}

impl Screening {
    /// Whether the evidence stage has any work to do.
    pub fn needs_evidence(&self) -> bool {
        !self.claims.is_empty()
    }
}

/// Run the rule filter and, unless it hard-blocks, claim extraction.
///
/// Rejects empty or whitespace-only content.
pub fn screen(request: &ClassificationRequest) -> Result<Screening, EvaluationError> {
    if request.content.trim().is_empty() {
        return Err(EvaluationError::EmptyContent);
    }

    let flags = RuleFilter::new().validate(
        &request.content,
        &request.user_context,
        request.image_data.as_ref(),
    );

    let claims = if flags.is_hard_block() {
        Vec::new()
    } else {
        extract_claims(&request.content)
    };

    Ok(Screening { flags, claims })
}

/// Decide a request without consulting any search provider.
///
/// Every extracted claim is treated as unsearchable, so this is the verdict
/// the full pipeline reaches when all evidence lookups fail.
pub fn classify_offline(
    request: &ClassificationRequest,
) -> Result<ClassificationResponse, EvaluationError> {
    let screening = screen(request)?;
    let assessments: Vec<EvidenceAssessment> = screening
        .claims
        .iter()
        .map(|claim| EvidenceAssessment::unavailable(claim))
        .collect();

    let decision = DecisionEngine::new().decide(&screening.flags, &assessments);
    let explanation = ExplanationResult::fallback(decision.decision);

    Ok(ClassificationResponse::assemble(
        decision,
        explanation,
        screening.flags,
        &assessments,
    ))
}
