//! # Finova Engine
//!
//! Stateful reward service built on the pure computations in
//! `finova-rewards` and `finova-trust`, with the event ledger as the
//! source of truth.
//!
//! ## Components
//!
//! - [`engine`]: the [`RewardEngine`] facade, per-user serialization and ledger replay
//! - [`session`]: mining session accrual over rate checkpoints
//! - [`events`]: ledger event payloads
//! - [`guild`], [`rate_limit`]: membership registry and per-user write throttling
//! - [`api`]: axum REST surface
//! - [`config`], [`metrics`]: service configuration and Prometheus metrics

pub mod api;
pub mod config;
pub mod engine;
pub mod events;
pub mod guild;
pub mod metrics;
pub mod rate_limit;
pub mod session;

pub use config::{EngineConfig, EngineSettings, RateLimitSettings};
pub use engine::{
    ActivityOutcome, MiningRate, MiningStarted, MiningStopped, NetworkSnapshot, ReferralApplied,
    RewardEngine, StakeReceipt, SweepReport, UserProfile,
};
pub use events::LedgerEvent;
pub use metrics::EngineMetrics;
