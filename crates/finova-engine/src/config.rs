//! Engine configuration
//!
//! Service settings come from an optional `finova.toml` (or the file named by
//! `FINOVA_CONFIG`) overlaid with `FINOVA_`-prefixed environment variables,
//! nested keys separated by `__` (`FINOVA_RATE_LIMIT__MAX_OPS_PER_WINDOW`).
//! Reward policy values live in a separate versioned JSON document.

use anyhow::{Context, Result};
use finova_common::RewardPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Service host
    pub host: String,
    /// Service port
    pub port: u16,
    /// JSON-lines ledger file; in-memory ledger when unset
    pub ledger_path: Option<PathBuf>,
    /// Reward policy JSON; built-in defaults when unset
    pub policy_path: Option<PathBuf>,
    pub rate_limit: RateLimitSettings,
    /// Interval of the background sweep closing timed-out sessions
    pub sweep_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
            ledger_path: None,
            policy_path: None,
            rate_limit: RateLimitSettings::default(),
            sweep_interval_secs: 60,
        }
    }
}

impl EngineConfig {
    /// Load configuration from `.env`, the config file and the environment
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();

        let file = std::env::var("FINOVA_CONFIG").unwrap_or_else(|_| "finova".to_string());

        let mut cfg: Self = config::Config::builder()
            .add_source(config::File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix("FINOVA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read configuration")?
            .try_deserialize()
            .context("invalid configuration")?;

        // Platform-provided PORT takes priority
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(p) = port.parse::<u16>() {
                cfg.port = p;
            }
        }

        Ok(cfg)
    }

    /// Reward policy from `policy_path`, or the defaults
    pub fn load_policy(&self) -> Result<RewardPolicy> {
        match &self.policy_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read policy {}", path.display()))?;
                Ok(RewardPolicy::from_json(&raw)?)
            }
            None => {
                let policy = RewardPolicy::default();
                policy.validate()?;
                Ok(policy)
            }
        }
    }
}

/// Per-user write throttling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Write operations allowed per user per window
    pub max_ops_per_window: u32,
    pub window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_ops_per_window: 120,
            window_secs: 60,
        }
    }
}

/// Everything the engine itself needs, independent of the transport
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub policy: RewardPolicy,
    pub rate_limit: RateLimitSettings,
}

impl EngineSettings {
    pub fn new(policy: RewardPolicy) -> Self {
        Self {
            policy,
            rate_limit: RateLimitSettings::default(),
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitSettings) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}
