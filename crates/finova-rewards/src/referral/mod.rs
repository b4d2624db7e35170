//! Referral network analyzer
//!
//! - [`graph`]: the referral forest (no cycles, at most one referrer per user)
//! - [`points`]: RP propagation with exponential depth regression
//! - [`tier`]: RP tier from accumulated RP and active direct referees
//! - [`codes`]: referral code derivation

pub mod codes;
pub mod graph;
pub mod points;
pub mod tier;

pub use graph::ReferralForest;
pub use points::{propagate, RpDelta};
pub use tier::{network_regression, referral_bonus, tier_for, NetworkStats};
