//! Compiled safety patterns.
//!
//! Hard-block patterns live in a single table keyed by the flag they raise, so
//! adding a rule means adding a row here rather than touching filter logic.

use lazy_static::lazy_static;
use regex::Regex;

/// The rule flag a hard-block pattern raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HardBlockKind {
    Dosage,
    Treatment,
    Diagnosis,
    Emergency,
}

impl HardBlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HardBlockKind::Dosage => "dosage",
            HardBlockKind::Treatment => "treatment_instruction",
            HardBlockKind::Diagnosis => "diagnosis_assertion",
            HardBlockKind::Emergency => "emergency_directive",
        }
    }
}

/// A compiled hard-block rule.
pub struct HardBlockPattern {
    pub kind: HardBlockKind,
    pub regex: Regex,
}

lazy_static! {
    // =========================================================================
    // HARD-BLOCK PATTERNS
    // =========================================================================

    /// A number followed by a dosage unit (e.g. "400mg", "2 tablets")
    pub static ref DOSAGE_PATTERN: Regex = Regex::new(
        r"(?i)\b\d+\s*(mg|ml|mcg|g|units?|tablets?|pills?|capsules?)\b"
    ).unwrap();

    /// Imperative to take a medicine (e.g. "take this medication")
    pub static ref TREATMENT_PATTERN: Regex = Regex::new(
        r"(?i)(take|use|apply|consume|inject|administer)\s+(this|these|the)\s+(medicine|medication|drug|treatment)"
    ).unwrap();

    /// Assertion of a specific diagnosis
    pub static ref DIAGNOSIS_PATTERN: Regex = Regex::new(
        r"(?i)(you have|diagnosed with|this is|appears to be)\s+(cancer|diabetes|heart disease|stroke|infection)"
    ).unwrap();

    /// Emergency directive
    pub static ref EMERGENCY_PATTERN: Regex = Regex::new(
        r"(?i)(call 911|emergency room|urgent care|immediate medical attention|life-threatening)"
    ).unwrap();

    /// All hard-block rules in evaluation order.
    pub static ref HARD_BLOCK_PATTERNS: Vec<HardBlockPattern> = vec![
        HardBlockPattern { kind: HardBlockKind::Dosage, regex: DOSAGE_PATTERN.clone() },
        HardBlockPattern { kind: HardBlockKind::Treatment, regex: TREATMENT_PATTERN.clone() },
        HardBlockPattern { kind: HardBlockKind::Diagnosis, regex: DIAGNOSIS_PATTERN.clone() },
        HardBlockPattern { kind: HardBlockKind::Emergency, regex: EMERGENCY_PATTERN.clone() },
    ];

    // =========================================================================
    // CLAIM DETECTION PATTERNS
    // =========================================================================

    /// Whole-word medical keywords that make content a medical claim
    pub static ref MEDICAL_KEYWORD_PATTERN: Regex = Regex::new(
        r"(?i)\b(cure|treat|diagnose|symptom|disease|condition|medication|doctor|patient|health)\b"
    ).unwrap();

    /// Whole-word verbs that make a sentence claim-shaped
    pub static ref CLAIM_VERB_PATTERN: Regex = Regex::new(
        r"(?i)\b(cure|treat|prevent|cause|help|reduce|increase|improve)\b"
    ).unwrap();

    /// Sentence terminators
    pub static ref SENTENCE_SPLIT_PATTERN: Regex = Regex::new(r"[.!?]+").unwrap();
}

/// Hard-block rules matching `content`, in table order.
pub fn matching_hard_blocks(content: &str) -> Vec<HardBlockKind> {
    HARD_BLOCK_PATTERNS
        .iter()
        .filter(|pattern| pattern.regex.is_match(content))
        .map(|pattern| pattern.kind)
        .collect()
}

/// Check if content mentions a medical keyword.
pub fn contains_medical_keyword(content: &str) -> bool {
    MEDICAL_KEYWORD_PATTERN.is_match(content)
}

/// Check if a sentence contains a claim verb.
pub fn contains_claim_verb(sentence: &str) -> bool {
    CLAIM_VERB_PATTERN.is_match(sentence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dosage_detection() {
        assert!(DOSAGE_PATTERN.is_match("Take 400mg of ibuprofen"));
        assert!(DOSAGE_PATTERN.is_match("2 tablets twice a day"));
        assert!(DOSAGE_PATTERN.is_match("inject 10 Units"));
        assert!(DOSAGE_PATTERN.is_match("5 ML of syrup"));
        assert!(!DOSAGE_PATTERN.is_match("I walked 400 meters"));
        assert!(!DOSAGE_PATTERN.is_match("mg without a number"));
    }

    #[test]
    fn test_treatment_detection() {
        assert!(TREATMENT_PATTERN.is_match("You should take this medicine daily"));
        assert!(TREATMENT_PATTERN.is_match("Apply the treatment to the area"));
        assert!(!TREATMENT_PATTERN.is_match("Take a walk outside"));
    }

    #[test]
    fn test_diagnosis_detection() {
        assert!(DIAGNOSIS_PATTERN.is_match("You have diabetes"));
        assert!(DIAGNOSIS_PATTERN.is_match("This is diabetes, not a cold"));
        assert!(DIAGNOSIS_PATTERN.is_match("She was diagnosed with cancer"));
        assert!(!DIAGNOSIS_PATTERN.is_match("You have a nice day"));
    }

    #[test]
    fn test_emergency_detection() {
        assert!(EMERGENCY_PATTERN.is_match("Call 911 right away"));
        assert!(EMERGENCY_PATTERN.is_match("Go to the Emergency Room"));
        assert!(EMERGENCY_PATTERN.is_match("This is life-threatening"));
        assert!(!EMERGENCY_PATTERN.is_match("Call your friend"));
    }

    #[test]
    fn test_matching_hard_blocks_in_table_order() {
        let kinds = matching_hard_blocks("Call 911 and take 2 pills");
        assert_eq!(kinds, vec![HardBlockKind::Dosage, HardBlockKind::Emergency]);
        assert!(matching_hard_blocks("The Eiffel Tower is in Paris.").is_empty());
    }

    #[test]
    fn test_medical_keywords_are_whole_words() {
        assert!(contains_medical_keyword("Good for your health"));
        assert!(contains_medical_keyword("Ask your Doctor"));
        assert!(!contains_medical_keyword("healthy habits"));
        assert!(!contains_medical_keyword("treatment plans"));
    }

    #[test]
    fn test_claim_verbs() {
        assert!(contains_claim_verb("Vitamin D supplements improve bone health"));
        assert!(contains_claim_verb("Exercise can help"));
        assert!(!contains_claim_verb("Exercise is helpful"));
    }
}
