//! Claim extraction.

use crate::rules::patterns::{contains_claim_verb, SENTENCE_SPLIT_PATTERN};
use crate::types::Claim;

/// At most this many claims are assessed per classification.
pub const MAX_CLAIMS: usize = 3;

/// Sentences must be longer than this (in characters, after trimming).
pub const MIN_SENTENCE_CHARS: usize = 10;

/// Split content into sentences and keep the first claim-shaped ones.
pub fn extract_claims(content: &str) -> Vec<Claim> {
    SENTENCE_SPLIT_PATTERN
        .split(content)
        .map(str::trim)
        .filter(|sentence| sentence.chars().count() > MIN_SENTENCE_CHARS)
        .filter(|sentence| contains_claim_verb(sentence))
        .take(MAX_CLAIMS)
        .map(str::to_string)
        .collect()
}
