//! # Finova Rewards
//!
//! Pure reward computation for the Finova engine. Nothing in this crate
//! touches storage or locks; the engine feeds it committed user state and
//! persists what it returns.
//!
//! ## Components
//!
//! - [`xp`]: activity to XP, quality and repetition decay, platform caps, levels
//! - [`referral`]: referral forest, RP propagation, RP tiers, referral codes
//! - [`rate`]: effective mining rate and its breakdown
//! - [`bonus`]: staking, card and guild modifiers under a global cap
//! - [`staking`]: positions, loyalty, projections and early-exit penalties

pub mod bonus;
pub mod rate;
pub mod referral;
pub mod staking;
pub mod xp;

pub use bonus::{BonusResolution, BonusResolver, BonusStack, Target};
pub use rate::{RateBreakdown, RateCalculator, RateInputs};
pub use referral::{propagate, ReferralForest, RpDelta};
pub use staking::{StakeProjection, Unstake};
pub use xp::{XpDelta, XpEngine};
