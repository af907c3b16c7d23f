//! Source credibility tiers.
//!
//! A tier table maps source domains onto five credibility classes. Tables are
//! structured data validated against JSON Schema; the built-in table is
//! embedded at compile time and loaded once.

mod schema;
mod table;

pub use schema::{validate_tier_table_schema, SchemaError};
pub use table::{TierRule, TierTable, TierTableError, UntrustedRule, DEFAULT_TIER_TABLE_YAML};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Credibility tier of a source. Lower is more credible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Tier {
    /// National and international health authorities.
    Authority = 1,
    /// Peer-reviewed research and major clinical institutions.
    PeerReviewed = 2,
    /// Credible patient-facing health sites.
    PatientInformation = 3,
    /// Generic `.edu` / `.gov` domains.
    GeneralEducational = 4,
    /// Everything else.
    Untrusted = 5,
}

impl Tier {
    /// All tiers, most credible first.
    pub const ALL: [Tier; 5] = [
        Tier::Authority,
        Tier::PeerReviewed,
        Tier::PatientInformation,
        Tier::GeneralEducational,
        Tier::Untrusted,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn is_trusted(self) -> bool {
        self != Tier::Untrusted
    }
}

impl From<Tier> for u8 {
    fn from(tier: Tier) -> Self {
        tier.number()
    }
}

impl TryFrom<u8> for Tier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Tier::Authority),
            2 => Ok(Tier::PeerReviewed),
            3 => Ok(Tier::PatientInformation),
            4 => Ok(Tier::GeneralEducational),
            5 => Ok(Tier::Untrusted),
            other => Err(format!("tier must be between 1 and 5, got {}", other)),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.number())
    }
}
