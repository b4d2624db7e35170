//! RP propagation with depth regression
//!
//! points(depth) = delta × share(source) × decay^depth, depth 0 = direct referrer

use finova_common::policy::ReferralPolicy;
use finova_common::{RpSource, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpDelta {
    pub ancestor: UserId,
    pub depth: u32,
    pub points: f64,
}

/// Share of a descendant delta paid to the direct referrer
pub fn base_share(policy: &ReferralPolicy, source: RpSource) -> f64 {
    match source {
        RpSource::Xp => policy.xp_share,
        RpSource::Mining => policy.mining_share,
    }
}

/// RP owed to one ancestor at `depth`
pub fn contribution(policy: &ReferralPolicy, delta: f64, source: RpSource, depth: u32) -> f64 {
    delta * base_share(policy, source) * policy.decay.powi(depth.min(i32::MAX as u32) as i32)
}

/// RP deltas for each ancestor, nearest first
///
/// `ancestors[i]` sits at depth `i`. Contributions below the policy minimum
/// are dropped, as is everything past `max_depth`.
pub fn propagate(
    policy: &ReferralPolicy,
    ancestors: &[UserId],
    delta: f64,
    source: RpSource,
) -> Vec<RpDelta> {
    if !delta.is_finite() || delta <= 0.0 {
        return Vec::new();
    }

    ancestors
        .iter()
        .take(policy.max_depth as usize)
        .enumerate()
        .map(|(depth, ancestor)| RpDelta {
            ancestor: ancestor.clone(),
            depth: depth as u32,
            points: contribution(policy, delta, source, depth as u32),
        })
        .take_while(|d| d.points >= policy.min_contribution)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(n: usize) -> Vec<UserId> {
        (0..n).map(|i| UserId::new(format!("u{}", i)).unwrap()).collect()
    }

    #[test]
    fn test_depth_regression() {
        let policy = ReferralPolicy::default();
        let deltas = propagate(&policy, &chain(3), 100.0, RpSource::Xp);
        assert_eq!(deltas.len(), 3);
        assert!((deltas[0].points - 5.0).abs() < 1e-12);
        assert!((deltas[1].points - 2.5).abs() < 1e-12);
        assert!((deltas[2].points - 1.25).abs() < 1e-12);
    }

    #[test]
    fn test_max_depth_and_minimum() {
        let policy = ReferralPolicy::default();
        let deltas = propagate(&policy, &chain(20), 100.0, RpSource::Mining);
        assert_eq!(deltas.len(), 10);

        let tiny = propagate(&policy, &chain(5), 1e-9, RpSource::Xp);
        assert!(tiny.is_empty());
    }

    #[test]
    fn test_non_positive_delta() {
        let policy = ReferralPolicy::default();
        assert!(propagate(&policy, &chain(2), 0.0, RpSource::Xp).is_empty());
        assert!(propagate(&policy, &chain(2), f64::NAN, RpSource::Xp).is_empty());
    }
}
