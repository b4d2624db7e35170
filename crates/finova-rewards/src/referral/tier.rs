//! RP tier classification and the network-quality adjusted referral bonus

use finova_common::policy::{ReferralPolicy, RpTierRule};
use finova_common::RpTier;
use serde::{Deserialize, Serialize};

/// Shape of a user's referral network at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    /// Direct referees
    pub direct: u32,
    /// Direct referees active inside the dormancy window
    pub active: u32,
    /// Descendants up to the propagation depth
    pub size: u64,
}

impl NetworkStats {
    /// Share of direct referees still active; an empty network counts as 1
    pub fn quality(&self) -> f64 {
        if self.direct == 0 {
            1.0
        } else {
            (self.active.min(self.direct)) as f64 / self.direct as f64
        }
    }
}

/// Highest tier whose RP and active-referee minimums are both met
pub fn tier_for(policy: &ReferralPolicy, rp: f64, active_referees: u32) -> RpTier {
    rule_for(policy, rp, active_referees)
        .map(|r| r.tier)
        .unwrap_or_default()
}

/// `e^(-k × size × quality)`, floored at the policy minimum
pub fn network_regression(policy: &ReferralPolicy, network: &NetworkStats) -> f64 {
    let exponent = -policy.network_regression_k * network.size as f64 * network.quality();
    let factor = exponent.exp();
    if factor.is_finite() {
        factor.min(1.0).max(policy.min_network_regression)
    } else {
        policy.min_network_regression
    }
}

/// Referral bonus multiplier for the user's current standing
///
/// Only the part of the tier bonus above 1.0 is scaled by network quality
/// and regression, so the multiplier never drops below 1.0.
pub fn referral_bonus(policy: &ReferralPolicy, rp: f64, network: &NetworkStats) -> f64 {
    let tier_bonus = rule_for(policy, rp, network.active)
        .map(|r| r.bonus)
        .unwrap_or(1.0);
    let uplift = (tier_bonus - 1.0).max(0.0);
    1.0 + uplift * network.quality() * network_regression(policy, network)
}

fn rule_for(policy: &ReferralPolicy, rp: f64, active_referees: u32) -> Option<&RpTierRule> {
    policy
        .tiers
        .iter()
        .rev()
        .find(|t| rp >= t.min_rp && active_referees >= t.min_active_referees)
}
