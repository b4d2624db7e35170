//! Mining rate calculator
//!
//! effective = clamp(base × finizen × referral × security × regression × xp_level, 0, max_rate)
//!
//! Pure function of the inputs; all rates are FIN per second.

use finova_common::policy::RatePolicy;
use serde::{Deserialize, Serialize};

/// Aggregate state the rate depends on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateInputs {
    /// Registered users across the network
    pub total_users: u64,
    /// Multiplier of the user's RP tier
    pub referral_bonus: f64,
    pub trust_score: f64,
    pub humanity_proof_required: bool,
    /// Total FIN held (liquid + staked)
    pub holdings: f64,
    pub level: u32,
}

/// Every factor of the effective rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateBreakdown {
    pub base: f64,
    pub finizen: f64,
    pub referral: f64,
    pub security: f64,
    pub regression: f64,
    pub xp_level: f64,
    /// Product before clamping
    pub raw: f64,
    /// Clamped effective rate
    pub rate: f64,
}

pub struct RateCalculator {
    policy: RatePolicy,
    humanity_floor: f64,
}

impl RateCalculator {
    pub fn new(policy: RatePolicy, humanity_floor: f64) -> Self {
        Self {
            policy,
            humanity_floor,
        }
    }

    pub fn policy(&self) -> &RatePolicy {
        &self.policy
    }

    pub fn effective_rate(&self, inputs: &RateInputs) -> RateBreakdown {
        let base = self.policy.base_rate;
        let finizen = self.finizen_bonus(inputs.total_users);
        let referral = sanitize(inputs.referral_bonus);
        let security = self.security_bonus(inputs.trust_score, inputs.humanity_proof_required);
        let regression = self.regression_factor(inputs.holdings);
        let xp_level = self.xp_level_bonus(inputs.level);

        let raw = base * finizen * referral * security * regression * xp_level;

        RateBreakdown {
            base,
            finizen,
            referral,
            security,
            regression,
            xp_level,
            raw,
            rate: self.clamp(raw),
        }
    }

    /// Early-adopter multiplier, shrinking as the network grows
    pub fn finizen_bonus(&self, total_users: u64) -> f64 {
        let bonus = self.policy.finizen_max - total_users as f64 / self.policy.finizen_user_scale;
        sanitize(bonus.max(1.0))
    }

    /// Step function of trust; zero while a humanity proof is outstanding
    pub fn security_bonus(&self, trust_score: f64, humanity_proof_required: bool) -> f64 {
        if humanity_proof_required || !trust_score.is_finite() || trust_score < self.humanity_floor {
            0.0
        } else if trust_score < self.policy.security_full_threshold {
            self.policy.security_partial
        } else {
            1.0
        }
    }

    /// e^(-k × holdings)
    pub fn regression_factor(&self, holdings: f64) -> f64 {
        if !holdings.is_finite() {
            return 0.0;
        }
        sanitize((-self.policy.regression_k * holdings.max(0.0)).exp())
    }

    pub fn xp_level_bonus(&self, level: u32) -> f64 {
        let bonus = 1.0 + level.saturating_sub(1) as f64 * self.policy.xp_level_step;
        sanitize(bonus.min(self.policy.xp_level_cap))
    }

    /// Clamp to [0, max_rate]; non-finite values become 0
    pub fn clamp(&self, rate: f64) -> f64 {
        if rate.is_finite() {
            rate.clamp(0.0, self.policy.max_rate)
        } else {
            0.0
        }
    }
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        0.0
    }
}
