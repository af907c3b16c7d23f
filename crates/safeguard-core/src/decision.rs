//! Decision engine: merges rule flags and evidence verdicts into one outcome.
//!
//! The engine applies strict, ordered policy rules; the first match wins:
//! 1. Any hard-block flag → REFUSE
//! 2. Missing patient context → ASK_MORE_INFO
//! 3. Any claim with NO_SUPPORT → REFUSE
//! 4. Any claim with CONFLICTING evidence → ESCALATE
//! 5. Every claim supported → ALLOW
//! 6. Otherwise, including no claims at all → ALLOW_WITH_WARNING

use crate::types::{Decision, DecisionKind, EvidenceAssessment, EvidenceStatus, RuleFlags, Severity};

pub const REASON_PROHIBITED_INSTRUCTIONS: &str = "Content contains prohibited medical instructions";
pub const REASON_MISSING_CONTEXT: &str =
    "Medical claims require patient context (age, symptoms, history, timeframe)";
pub const REASON_NO_EVIDENCE: &str = "Medical claim lacks supporting evidence from trusted sources";
pub const REASON_CONFLICTING: &str = "Conflicting evidence found - requires professional review";
pub const REASON_SUPPORTED: &str = "General health information supported by trusted sources";
pub const REASON_LIMITED_EVIDENCE: &str =
    "Limited evidence available - verify with healthcare professional";

/// The decision engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Produce the single verdict for a classification.
    pub fn decide(&self, flags: &RuleFlags, assessments: &[EvidenceAssessment]) -> Decision {
        let decision = if flags.is_hard_block() {
            verdict(DecisionKind::Refuse, Severity::High, REASON_PROHIBITED_INSTRUCTIONS)
        } else if flags.missing_user_information {
            verdict(DecisionKind::AskMoreInfo, Severity::Medium, REASON_MISSING_CONTEXT)
        } else if has_status(assessments, EvidenceStatus::NoSupport) {
            verdict(DecisionKind::Refuse, Severity::High, REASON_NO_EVIDENCE)
        } else if has_status(assessments, EvidenceStatus::Conflicting) {
            verdict(DecisionKind::Escalate, Severity::Medium, REASON_CONFLICTING)
        } else if !assessments.is_empty()
            && assessments.iter().all(|a| a.evidence_status.is_supportive())
        {
            verdict(DecisionKind::Allow, Severity::Low, REASON_SUPPORTED)
        } else {
            verdict(DecisionKind::AllowWithWarning, Severity::Medium, REASON_LIMITED_EVIDENCE)
        };

        tracing::debug!(
            decision = %decision.decision,
            severity = %decision.severity,
            claims = assessments.len(),
            "Decision reached"
        );

        decision
    }
}

fn has_status(assessments: &[EvidenceAssessment], status: EvidenceStatus) -> bool {
    assessments.iter().any(|a| a.evidence_status == status)
}

fn verdict(decision: DecisionKind, severity: Severity, reason: &str) -> Decision {
    Decision {
        decision,
        reason: reason.to_string(),
        severity,
    }
}
