//! Rule filter: deterministic hard-safety screening.
//!
//! Scans raw content against the compiled pattern table and the patient
//! context requirements. Hard-block flags and the missing-information flag are
//! computed independently; the decision engine decides which one wins.

pub mod patterns;

use serde_json::Value as JsonValue;

use crate::types::{ImageQuality, RuleFlags, UserContext};

use patterns::{contains_medical_keyword, matching_hard_blocks, HardBlockKind};

/// Context keys that must all be present when content makes a medical claim.
pub const REQUIRED_CONTEXT_KEYS: [&str; 4] = ["age", "symptoms", "medicalHistory", "timeframe"];

/// Image payloads shorter than this many characters are rated low quality.
pub const MIN_IMAGE_PAYLOAD_LEN: usize = 1000;

/// The rule filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleFilter;

impl RuleFilter {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate content and context against every safety rule.
    ///
    /// `image_data` is the optional image payload accompanying the content;
    /// `image_quality` stays `Unknown` when it is `None` or JSON null.
    pub fn validate(
        &self,
        content: &str,
        user_context: &UserContext,
        image_data: Option<&JsonValue>,
    ) -> RuleFlags {
        let mut flags = RuleFlags::default();

        for kind in matching_hard_blocks(content) {
            match kind {
                HardBlockKind::Dosage => flags.contains_dosage = true,
                HardBlockKind::Treatment => flags.contains_treatment = true,
                HardBlockKind::Diagnosis => flags.contains_diagnosis = true,
                HardBlockKind::Emergency => flags.contains_emergency = true,
            }
            tracing::trace!(rule = kind.as_str(), "Hard-block pattern matched");
        }

        if contains_medical_keyword(content) {
            flags.missing_user_information = !has_required_context(user_context);
        }

        if let Some(payload) = image_data {
            flags.image_quality = assess_image(payload);
        }

        tracing::debug!(
            hard_block = flags.is_hard_block(),
            missing_user_information = flags.missing_user_information,
            "Rule filter evaluated"
        );

        flags
    }
}

/// True when every required context key is present. Values are not inspected.
pub fn has_required_context(user_context: &UserContext) -> bool {
    REQUIRED_CONTEXT_KEYS
        .iter()
        .all(|key| user_context.contains_key(*key))
}

/// Only string payloads are measured; any other JSON value rates low.
fn assess_image(payload: &JsonValue) -> ImageQuality {
    match payload {
        JsonValue::Null => ImageQuality::Unknown,
        JsonValue::String(encoded) if encoded.chars().count() >= MIN_IMAGE_PAYLOAD_LEN => {
            ImageQuality::Acceptable
        }
        _ => ImageQuality::Low,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_context() -> UserContext {
        let mut context = UserContext::new();
        context.insert("age".into(), json!(45));
        context.insert("symptoms".into(), json!("none"));
        context.insert("medicalHistory".into(), json!("none"));
        context.insert("timeframe".into(), json!("3 months"));
        context
    }

    #[test]
    fn test_dosage_sets_hard_block() {
        let flags = RuleFilter::new().validate(
            "Take 400mg of ibuprofen every 6 hours.",
            &UserContext::new(),
            None,
        );
        assert!(flags.contains_dosage);
        assert!(flags.is_hard_block());
    }

    #[test]
    fn test_non_medical_content_is_clean() {
        let flags = RuleFilter::new().validate(
            "The Eiffel Tower is located in Paris.",
            &UserContext::new(),
            None,
        );
        assert_eq!(flags, RuleFlags::default());
    }

    #[test]
    fn test_medical_claim_without_context() {
        let flags = RuleFilter::new().validate(
            "Vitamin D supplements improve bone health.",
            &UserContext::new(),
            None,
        );
        assert!(flags.missing_user_information);
        assert!(!flags.is_hard_block());
    }

    #[test]
    fn test_partial_context_is_missing_information() {
        let mut context = full_context();
        context.remove("timeframe");
        let flags = RuleFilter::new().validate("Is this a symptom?", &context, None);
        assert!(flags.missing_user_information);
    }

    #[test]
    fn test_full_context_satisfies_requirement() {
        let flags = RuleFilter::new().validate(
            "Vitamin D supplements improve bone health.",
            &full_context(),
            None,
        );
        assert!(!flags.missing_user_information);
    }

    #[test]
    fn test_null_context_values_still_count() {
        let mut context = full_context();
        context.insert("age".into(), serde_json::Value::Null);
        assert!(has_required_context(&context));
    }

    #[test]
    fn test_hard_block_and_missing_info_are_independent() {
        let flags = RuleFilter::new().validate(
            "Your doctor says take 2 tablets.",
            &UserContext::new(),
            None,
        );
        assert!(flags.contains_dosage);
        assert!(flags.missing_user_information);
    }

    #[test]
    fn test_image_quality() {
        let filter = RuleFilter::new();
        let empty = UserContext::new();

        let quality = |payload: Option<JsonValue>| {
            filter.validate("hi there", &empty, payload.as_ref()).image_quality
        };

        assert_eq!(quality(None), ImageQuality::Unknown);
        assert_eq!(quality(Some(JsonValue::Null)), ImageQuality::Unknown);
        assert_eq!(quality(Some(json!(""))), ImageQuality::Low);
        assert_eq!(quality(Some(json!("a".repeat(999)))), ImageQuality::Low);
        assert_eq!(quality(Some(json!("a".repeat(1000)))), ImageQuality::Acceptable);
    }

    #[test]
    fn test_image_length_counts_characters() {
        let filter = RuleFilter::new();
        let empty = UserContext::new();
        // 999 characters, 1998 bytes
        let payload = json!("\u{e9}".repeat(999));
        assert_eq!(
            filter.validate("hi there", &empty, Some(&payload)).image_quality,
            ImageQuality::Low
        );
    }

    #[test]
    fn test_non_string_image_rates_low() {
        let filter = RuleFilter::new();
        let empty = UserContext::new();
        for payload in [json!({"url": "https://example.org/x.png"}), json!([1, 2, 3]), json!(42)] {
            assert_eq!(
                filter.validate("hi there", &empty, Some(&payload)).image_quality,
                ImageQuality::Low
            );
        }
    }
}
