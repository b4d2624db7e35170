//! # Finova Common
//!
//! Shared types, errors, policy and clock for the Finova reward engine.
//!
//! ## Core Types
//!
//! - [`UserState`]: per-user projection (XP, RP, trust, wallet, stake, session, cards)
//! - [`ActivityEvent`]: immutable activity fact keyed by a unique [`EventId`]
//! - [`TrustScore`]: 0-1 confidence that a user is human, with per-kind components
//! - [`MiningSession`]: session record with rate checkpoints
//! - [`CardEffect`] / [`StakePosition`]: bonus sources owned by a user
//!
//! ## Policy
//!
//! - [`RewardPolicy`]: versioned thresholds, percentages and caps
//!
//! ## Clock
//!
//! - [`Clock`]: server time source; [`SystemClock`] in production, [`ManualClock`] in tests

pub mod clock;
pub mod error;
pub mod policy;
pub mod types;

// Re-export commonly used types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ErrorClass, FinovaError, Result};
pub use policy::{LevelCurve, RewardPolicy};
pub use types::{
    activity::{ActivityEvent, ActivityPayload, ActivityType, Platform},
    card::{CardCategory, CardEffect, CardKind, CardUsage, StackingRule},
    ids::{CardId, EventId, GuildId, SessionId, StakePositionId, UserId},
    referral::{RpSource, RpTier},
    session::{CloseReason, MiningSession, RateCheckpoint, SessionStatus},
    staking::{StakePosition, StakingTier},
    trust_score::{EvidenceKind, IdentitySignal, KindAggregate, RiskTier, TrustEvidence, TrustScore},
    user::{UserState, XpAward, XpProgress},
    wallet::{fin_amount, fin_to_f64, FinWallet},
};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Milliseconds per day
pub const MS_PER_DAY: i64 = 86_400_000;

/// Decimal places kept for FIN amounts
pub const FIN_SCALE: u32 = 8;
