//! Staking positions and tiers

use super::ids::StakePositionId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Staking tier, determined by the staked amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingTier {
    Basic,
    Premium,
    Vip,
    Elite,
    Whale,
}

impl StakingTier {
    pub const ALL: [StakingTier; 5] = [
        StakingTier::Basic,
        StakingTier::Premium,
        StakingTier::Vip,
        StakingTier::Elite,
        StakingTier::Whale,
    ];
}

impl std::fmt::Display for StakingTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StakingTier::Basic => "basic",
            StakingTier::Premium => "premium",
            StakingTier::Vip => "vip",
            StakingTier::Elite => "elite",
            StakingTier::Whale => "whale",
        };
        f.write_str(name)
    }
}

/// An open staking position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakePosition {
    pub id: StakePositionId,
    /// Staked FIN
    pub amount: Decimal,
    /// Committed duration
    pub duration_days: u32,
    /// Server time the position was opened (Unix millis)
    pub started_at: i64,
    pub tier: StakingTier,
}

impl StakePosition {
    /// Whole days the position has been open at `now`
    pub fn days_staked(&self, now: i64) -> u32 {
        ((now - self.started_at).max(0) / 86_400_000) as u32
    }
}
