//! Deterministic explanation fallbacks.
//!
//! Used whenever the explanation provider is unavailable, errors, times out
//! or returns empty text.

use crate::types::{DecisionKind, ExplanationResult, GENERATED_BY_FALLBACK};

/// Fixed explanation sentence for a decision.
pub fn fallback_explanation(decision: DecisionKind) -> &'static str {
    match decision {
        DecisionKind::Refuse => {
            "This content contains medical instructions or claims that lack credible support. \
             Please consult a qualified healthcare professional."
        }
        DecisionKind::Escalate => {
            "This content requires professional review due to conflicting information or complexity."
        }
        DecisionKind::AskMoreInfo => {
            "To properly evaluate this medical content, we need more context about your situation."
        }
        DecisionKind::AllowWithWarning => {
            "This appears to be general health information, but always verify with a healthcare professional."
        }
        DecisionKind::Allow => {
            "This appears to be general health education content from trusted sources."
        }
    }
}

impl ExplanationResult {
    /// The fallback explanation for `decision`.
    pub fn fallback(decision: DecisionKind) -> Self {
        Self {
            explanation: fallback_explanation(decision).to_string(),
            generated_by: GENERATED_BY_FALLBACK.to_string(),
        }
    }

    /// An explanation produced by the named provider model.
    pub fn generated(explanation: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            explanation: explanation.into(),
            generated_by: model.into(),
        }
    }
}
