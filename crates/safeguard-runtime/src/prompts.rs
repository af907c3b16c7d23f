//! Prompts sent to LLM providers.
//!
//! The explanation prompt only ever asks the model to restate a decision the
//! deterministic engine already made. It never asks for medical content.

use safeguard_core::{Decision, EvidenceAssessment, RuleFlags};

/// System prompt for chat-mode answer generation.
pub const CHAT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant answering health-related questions. Be informative and helpful.";

/// Build the user prompt asking for a short explanation of `decision`.
pub fn build_explanation_prompt(
    decision: &Decision,
    flags: &RuleFlags,
    assessments: &[EvidenceAssessment],
) -> String {
    let flags_json = serde_json::to_string(flags).unwrap_or_else(|_| "{}".to_string());
    let statuses: Vec<&str> = assessments
        .iter()
        .map(|a| a.evidence_status.as_str())
        .collect();

    format!(
        r#"You are a safety explanation system. Your ONLY job is to explain why a decision was made.

DO NOT:
- Provide medical advice
- Diagnose conditions
- Recommend treatments
- Make medical claims

Decision: {decision}
Reason: {reason}
Rule Flags: {flags}
Evidence Status: [{statuses}]

Generate a clear, user-friendly explanation (2-3 sentences) that:
1. Explains the safety concern
2. References the evidence status if relevant
3. Recommends consulting a healthcare professional

Keep it concise and non-technical."#,
        decision = decision.decision,
        reason = decision.reason,
        flags = flags_json,
        statuses = statuses.join(", "),
    )
}
