//! Experience points from verified platform activity

pub mod engine;

pub use engine::{XpDelta, XpEngine};
