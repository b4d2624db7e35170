//! Operation results

use finova_common::{
    CardEffect, CloseReason, GuildId, RpTier, SessionId, StakePosition, StakePositionId,
    StakingTier, UserId,
};
use finova_rewards::bonus::BonusResolution;
use finova_rewards::referral::NetworkStats;
use finova_rewards::{RateBreakdown, RpDelta, StakeProjection, XpDelta};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningStarted {
    pub session_id: SessionId,
    pub started_at: i64,
    /// FIN per second at start
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningStopped {
    pub session_id: SessionId,
    pub total_mined: Decimal,
    pub duration_seconds: u64,
    pub reason: CloseReason,
}

/// Effective mining rate with every contributing factor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningRate {
    pub user_id: UserId,
    /// Final FIN per second after bonuses, within the policy ceiling
    pub rate: f64,
    /// Bonuses pushed the rate past the ceiling
    pub clamped: bool,
    pub rp_tier: RpTier,
    pub network: NetworkStats,
    pub breakdown: RateBreakdown,
    pub bonuses: BonusResolution,
    pub computed_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityOutcome {
    pub xp_delta: XpDelta,
    /// Set when the award crossed a level threshold
    pub new_level: Option<u32>,
    /// The event id had already been applied; nothing changed
    pub duplicate: bool,
    pub referral_points: Vec<RpDelta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralApplied {
    pub referrer_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeReceipt {
    pub stake_position_id: StakePositionId,
    pub tier: StakingTier,
    /// Total staked after this call
    pub staked: Decimal,
    pub projected_bonus: StakeProjection,
}

/// Live view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub started_at: i64,
    pub expires_at: i64,
    pub active: bool,
    /// FIN accrued as of the view
    pub accrued: f64,
    pub rate: f64,
    pub checkpoints: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub total_xp: u64,
    pub level: u32,
    /// Consecutive days with activity
    pub current_streak: u32,
    pub rp: f64,
    pub rp_tier: RpTier,
    pub active_referees: u32,
    pub trust_score: f64,
    pub humanity_proof_required: bool,
    pub identity_verified: bool,
    pub available: Decimal,
    pub staked: Decimal,
    pub stake: Option<StakePosition>,
    pub session: Option<SessionView>,
    pub cards: Vec<CardEffect>,
    pub guild: Option<GuildId>,
    pub referrer: Option<UserId>,
    pub referral_code: String,
    pub version: u64,
}

/// Network-wide aggregates, replaced as a whole on every change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    pub version: u64,
    pub total_users: u64,
    pub active_sessions: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub sessions_closed: usize,
    pub users_refreshed: usize,
}
