//! Referral tiers

use serde::{Deserialize, Serialize};

/// Referral Points tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpTier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl Default for RpTier {
    fn default() -> Self {
        RpTier::Bronze
    }
}

impl std::fmt::Display for RpTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RpTier::Bronze => "bronze",
            RpTier::Silver => "silver",
            RpTier::Gold => "gold",
            RpTier::Platinum => "platinum",
            RpTier::Diamond => "diamond",
        };
        f.write_str(name)
    }
}

/// Where a referral delta originates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpSource {
    /// XP earned by a descendant
    Xp,
    /// FIN mined by a descendant
    Mining,
}
