//! Bonus stack
//!
//! Staking tiers, cards and guild membership expressed as a closed set of
//! effects and folded onto a base value under a global cap.

pub mod effect;
pub mod resolver;

pub use effect::{BonusEffect, Modifier, Target};
pub use resolver::{AppliedBonus, BonusResolution, BonusResolver, BonusStack};
