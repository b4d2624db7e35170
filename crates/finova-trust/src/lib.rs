//! # Finova Trust
//!
//! Combines behavioral, biometric, social-graph and captcha evidence plus the
//! identity provider's verdict into a per-user trust score in [0, 1].
//!
//! A score below the humanity floor flags the user; the rate calculator reads
//! the flag as a zero multiplier until a passing proof of humanity is
//! recorded.

pub mod evidence;
pub mod scorer;

pub use scorer::{TrustScorer, TrustUpdate};
