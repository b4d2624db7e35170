//! Core data types for the Finova reward engine

pub mod activity;
pub mod card;
pub mod ids;
pub mod referral;
pub mod session;
pub mod staking;
pub mod trust_score;
pub mod user;
pub mod wallet;
