//! Effective mining rate

pub mod calculator;

pub use calculator::{RateBreakdown, RateCalculator, RateInputs};
