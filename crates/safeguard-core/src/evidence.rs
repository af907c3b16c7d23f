//! Evidence aggregation.
//!
//! Turns the raw hits found for one claim into an [`EvidenceAssessment`]:
//! every hit is classified against the tier table, sources are ranked, and the
//! per-tier counts are mapped onto an evidence status through a fixed rule
//! list where the first matching rule wins.

use serde::{Deserialize, Serialize};

use crate::tiers::{Tier, TierTable};
use crate::types::{
    ConfidenceLevel, EvidenceAssessment, EvidenceStatus, SearchHit, SourceRecord, TierBreakdown,
};

/// Error note attached to the terminal assessment when every search attempt failed.
pub const SEARCH_UNAVAILABLE_NOTE: &str = "All search methods unavailable";

/// Display limits for ranked sources.
pub const MAX_TIER1_SOURCES: usize = 3;
pub const MAX_TIER2_SOURCES: usize = 2;
pub const MAX_TIER3_SOURCES: usize = 2;

/// Which aggregation rule set to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationPolicy {
    /// Support rules only; anything else is NO_SUPPORT.
    #[default]
    Standard,
    /// Adds a CONFLICTING verdict when untrusted sources dominate.
    Strict,
}

/// Map per-tier counts onto a status and confidence level.
pub fn aggregate(
    counts: &TierBreakdown,
    policy: AggregationPolicy,
) -> (EvidenceStatus, ConfidenceLevel) {
    let t1 = counts.count(Tier::Authority);
    let t2 = counts.count(Tier::PeerReviewed);
    let t3 = counts.count(Tier::PatientInformation);
    let t4 = counts.count(Tier::GeneralEducational);
    let untrusted = counts.count(Tier::Untrusted);

    if t1 >= 2 || (t1 >= 1 && t2 + t3 >= 1) {
        (EvidenceStatus::StrongSupport, ConfidenceLevel::High)
    } else if t2 >= 2 {
        (EvidenceStatus::StrongSupport, ConfidenceLevel::MediumHigh)
    } else if t1 >= 1 {
        (EvidenceStatus::PartialSupport, ConfidenceLevel::MediumHigh)
    } else if t2 >= 1 || t3 >= 2 {
        (EvidenceStatus::PartialSupport, ConfidenceLevel::Medium)
    } else if t3 >= 1 || t4 >= 1 {
        (EvidenceStatus::PartialSupport, ConfidenceLevel::LowMedium)
    } else if policy == AggregationPolicy::Strict
        && untrusted > counts.trusted()
        && untrusted >= 2
    {
        (EvidenceStatus::Conflicting, ConfidenceLevel::Low)
    } else {
        (EvidenceStatus::NoSupport, ConfidenceLevel::None)
    }
}

/// Classify and rank hits, best first.
///
/// Ordering is by tier ascending then confidence descending; the sort is
/// stable so equal sources keep their search order.
pub fn rank_sources(hits: &[SearchHit], table: &TierTable) -> Vec<SourceRecord> {
    let mut sources: Vec<SourceRecord> = hits.iter().map(|hit| table.classify_hit(hit)).collect();
    sources.sort_by(|a, b| a.tier.cmp(&b.tier).then(b.confidence.cmp(&a.confidence)));
    sources
}

/// Build the assessment for one claim from the hits a search provider returned.
pub fn assess_hits(
    claim: &str,
    hits: &[SearchHit],
    table: &TierTable,
    policy: AggregationPolicy,
) -> EvidenceAssessment {
    let sources = rank_sources(hits, table);

    let mut breakdown = TierBreakdown::default();
    for source in &sources {
        breakdown.record(source.tier);
    }

    let (evidence_status, confidence_level) = aggregate(&breakdown, policy);

    tracing::debug!(
        claim_len = claim.len(),
        total = sources.len(),
        trusted = breakdown.trusted(),
        status = %evidence_status,
        "Evidence aggregated"
    );

    EvidenceAssessment {
        claim: claim.to_string(),
        evidence_status,
        confidence_level,
        trusted_sources_found: breakdown.trusted(),
        tier1_sources: take_tier(&sources, Tier::Authority, MAX_TIER1_SOURCES),
        tier2_sources: take_tier(&sources, Tier::PeerReviewed, MAX_TIER2_SOURCES),
        tier3_sources: take_tier(&sources, Tier::PatientInformation, MAX_TIER3_SOURCES),
        tier_breakdown: breakdown,
        total_results: sources.len(),
        fallback_applied: false,
        error: None,
    }
}

fn take_tier(sources: &[SourceRecord], tier: Tier, limit: usize) -> Vec<SourceRecord> {
    sources
        .iter()
        .filter(|source| source.tier == tier)
        .take(limit)
        .cloned()
        .collect()
}

impl EvidenceAssessment {
    /// Terminal assessment used when no search provider produced results.
    pub fn unavailable(claim: &str) -> Self {
        Self {
            claim: claim.to_string(),
            evidence_status: EvidenceStatus::NoSupport,
            confidence_level: ConfidenceLevel::None,
            trusted_sources_found: 0,
            tier1_sources: Vec::new(),
            tier2_sources: Vec::new(),
            tier3_sources: Vec::new(),
            tier_breakdown: TierBreakdown::default(),
            total_results: 0,
            fallback_applied: true,
            error: Some(SEARCH_UNAVAILABLE_NOTE.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn counts(t1: usize, t2: usize, t3: usize, t4: usize, untrusted: usize) -> TierBreakdown {
        TierBreakdown {
            government_who: t1,
            peer_reviewed_medical: t2,
            credible_health_info: t3,
            general_educational: t4,
            untrusted,
        }
    }

    fn hit(url: &str) -> SearchHit {
        SearchHit::new(url, "title")
    }

    #[test]
    fn test_aggregation_rules_in_order() {
        use ConfidenceLevel as C;
        use EvidenceStatus as S;
        let policy = AggregationPolicy::Standard;

        assert_eq!(aggregate(&counts(2, 0, 0, 0, 0), policy), (S::StrongSupport, C::High));
        assert_eq!(aggregate(&counts(1, 0, 1, 0, 0), policy), (S::StrongSupport, C::High));
        assert_eq!(aggregate(&counts(0, 2, 0, 0, 0), policy), (S::StrongSupport, C::MediumHigh));
        assert_eq!(aggregate(&counts(1, 0, 0, 5, 0), policy), (S::PartialSupport, C::MediumHigh));
        assert_eq!(aggregate(&counts(0, 1, 0, 0, 0), policy), (S::PartialSupport, C::Medium));
        assert_eq!(aggregate(&counts(0, 0, 2, 0, 0), policy), (S::PartialSupport, C::Medium));
        assert_eq!(aggregate(&counts(0, 0, 1, 0, 0), policy), (S::PartialSupport, C::LowMedium));
        assert_eq!(aggregate(&counts(0, 0, 0, 1, 9), policy), (S::PartialSupport, C::LowMedium));
        assert_eq!(aggregate(&counts(0, 0, 0, 0, 9), policy), (S::NoSupport, C::None));
        assert_eq!(aggregate(&counts(0, 0, 0, 0, 0), policy), (S::NoSupport, C::None));
    }

    #[test]
    fn test_strict_policy_reports_conflicting() {
        let strict = AggregationPolicy::Strict;
        assert_eq!(
            aggregate(&counts(0, 0, 0, 0, 2), strict),
            (EvidenceStatus::Conflicting, ConfidenceLevel::Low)
        );
        assert_eq!(
            aggregate(&counts(0, 0, 0, 0, 1), strict),
            (EvidenceStatus::NoSupport, ConfidenceLevel::None)
        );
        // Support rules still take precedence
        assert_eq!(
            aggregate(&counts(0, 0, 0, 1, 9), strict).0,
            EvidenceStatus::PartialSupport
        );
    }

    #[test]
    fn test_assess_hits_ranks_and_limits() {
        let hits = vec![
            hit("https://randomblog.net/a"),
            hit("https://www.webmd.com/a"),
            hit("https://www.who.int/a"),
            hit("https://www.cdc.gov/a"),
            hit("https://www.nhs.uk/a"),
            hit("https://www.fda.gov/a"),
            hit("https://www.mayoclinic.org/a"),
        ];

        let assessment = assess_hits(
            "Vitamin D supplements improve bone health",
            &hits,
            TierTable::builtin(),
            AggregationPolicy::Standard,
        );

        assert_eq!(assessment.evidence_status, EvidenceStatus::StrongSupport);
        assert_eq!(assessment.confidence_level, ConfidenceLevel::High);
        assert_eq!(assessment.tier_breakdown.government_who, 4);
        assert_eq!(assessment.tier1_sources.len(), MAX_TIER1_SOURCES);
        // Stable order within a tier
        assert_eq!(assessment.tier1_sources[0].url, "https://www.who.int/a");
        assert_eq!(assessment.tier1_sources[2].url, "https://www.nhs.uk/a");
        assert_eq!(assessment.tier2_sources.len(), 1);
        assert_eq!(assessment.tier3_sources.len(), 1);
        assert_eq!(assessment.trusted_sources_found, 6);
        assert_eq!(assessment.total_results, 7);
        assert!(!assessment.fallback_applied);
        assert!(assessment.error.is_none());
    }

    #[test]
    fn test_rank_sources_orders_by_tier() {
        let hits = vec![
            hit("https://example.com"),
            hit("https://www.stanford.edu"),
            hit("https://www.bmj.com"),
        ];
        let ranked = rank_sources(&hits, TierTable::builtin());
        let tiers: Vec<Tier> = ranked.iter().map(|s| s.tier).collect();
        assert_eq!(tiers, vec![Tier::PeerReviewed, Tier::GeneralEducational, Tier::Untrusted]);
    }

    #[test]
    fn test_no_hits_is_no_support() {
        let assessment =
            assess_hits("claim", &[], TierTable::builtin(), AggregationPolicy::Standard);
        assert_eq!(assessment.evidence_status, EvidenceStatus::NoSupport);
        assert_eq!(assessment.total_results, 0);
        assert!(!assessment.fallback_applied);
    }

    #[test]
    fn test_sources_carry_table_labels() {
        let table = TierTable::from_yaml(
            r#"
table_version: "3.1"
tiers:
  - { tier: 1, label: ministry, confidence: 100, domains: [mohfw.gov.in] }
  - { tier: 2, label: journals, confidence: 85, domains: [bmj.com] }
  - { tier: 3, label: consumer, confidence: 70, domains: [webmd.com] }
  - { tier: 4, label: academic, confidence: 60, domains: [.edu] }
untrusted: { label: other, confidence: 20 }
"#,
        )
        .unwrap();

        let hits = [hit("https://mohfw.gov.in/advisory"), hit("https://www.bmj.com/x")];
        let assessment = assess_hits("claim", &hits, &table, AggregationPolicy::Standard);
        assert_eq!(assessment.tier1_sources[0].label, "ministry");
        assert_eq!(assessment.tier2_sources[0].label, "journals");
    }

    #[test]
    fn test_unavailable_assessment() {
        let assessment = EvidenceAssessment::unavailable("claim");
        assert_eq!(assessment.evidence_status, EvidenceStatus::NoSupport);
        assert_eq!(assessment.confidence_level, ConfidenceLevel::None);
        assert!(assessment.fallback_applied);
        assert_eq!(assessment.tier_breakdown.total(), 0);
        assert_eq!(assessment.error.as_deref(), Some(SEARCH_UNAVAILABLE_NOTE));
    }

    fn support_rank(status: EvidenceStatus) -> u8 {
        match status {
            EvidenceStatus::NoSupport => 0,
            EvidenceStatus::Conflicting => 1,
            EvidenceStatus::PartialSupport => 2,
            EvidenceStatus::StrongSupport => 3,
        }
    }

    fn policy_strategy() -> impl Strategy<Value = AggregationPolicy> {
        prop_oneof![Just(AggregationPolicy::Standard), Just(AggregationPolicy::Strict)]
    }

    proptest! {
        #[test]
        fn prop_adding_tier1_source_never_weakens_verdict(
            t1 in 0usize..5,
            t2 in 0usize..5,
            t3 in 0usize..5,
            t4 in 0usize..5,
            untrusted in 0usize..10,
            policy in policy_strategy(),
        ) {
            let before = aggregate(&counts(t1, t2, t3, t4, untrusted), policy);
            let after = aggregate(&counts(t1 + 1, t2, t3, t4, untrusted), policy);

            prop_assert!(support_rank(after.0) >= support_rank(before.0));
            prop_assert!(after.1 >= before.1);
        }

        #[test]
        fn prop_any_trusted_source_is_supportive(
            t1 in 0usize..3,
            t2 in 0usize..3,
            t3 in 0usize..3,
            t4 in 0usize..3,
            untrusted in 0usize..10,
        ) {
            prop_assume!(t1 + t2 + t3 + t4 > 0);
            let (status, _) =
                aggregate(&counts(t1, t2, t3, t4, untrusted), AggregationPolicy::Strict);
            prop_assert!(status.is_supportive());
        }
    }
}
