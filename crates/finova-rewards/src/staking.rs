//! Staking positions
//!
//! Tier lookup, loyalty growth, reward projection and early-exit penalties.
//! Balance movement itself lives on [`finova_common::FinWallet`].

use finova_common::policy::{StakingPolicy, StakingTierRule};
use finova_common::{
    fin_amount, FinovaError, Result, StakePosition, StakePositionId, StakingTier, FIN_SCALE,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Staked days per loyalty step
const LOYALTY_PERIOD_DAYS: u32 = 30;

/// What a position earns, for receipts and previews
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakeProjection {
    pub tier: StakingTier,
    /// Additive mining boost including loyalty
    pub mining_boost: f64,
    pub xp_multiplier: f64,
    pub rp_bonus: f64,
    pub apy: f64,
    /// Loyalty fraction applied to the base mining boost
    pub loyalty: f64,
    /// Reward at APY over the committed duration
    pub projected_reward: Decimal,
}

/// Result of closing a position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unstake {
    pub position_id: StakePositionId,
    pub principal: Decimal,
    pub penalty: Decimal,
    pub released: Decimal,
    pub days_staked: u32,
}

/// Loyalty fraction after `days_staked` days
pub fn loyalty(policy: &StakingPolicy, days_staked: u32) -> f64 {
    let steps = (days_staked / LOYALTY_PERIOD_DAYS) as f64;
    (steps * policy.loyalty_step).clamp(0.0, policy.loyalty_cap)
}

/// Mining boost of `rule` after loyalty
pub fn mining_boost(policy: &StakingPolicy, rule: &StakingTierRule, days_staked: u32) -> f64 {
    rule.mining_boost * (1.0 + loyalty(policy, days_staked))
}

/// Open a new position or top up the existing one
///
/// A top-up keeps the original start time (loyalty is preserved) and the
/// longer of the two committed durations; the tier follows the new total.
pub fn open_or_top_up(
    policy: &StakingPolicy,
    existing: Option<&StakePosition>,
    amount: Decimal,
    duration_days: u32,
    now: i64,
) -> Result<StakePosition> {
    if amount <= Decimal::ZERO {
        return Err(FinovaError::InvalidInput("stake amount must be positive".into()));
    }
    if duration_days < policy.min_duration_days || duration_days > policy.max_duration_days {
        return Err(FinovaError::InvalidInput(format!(
            "stake duration {} outside {}..={} days",
            duration_days, policy.min_duration_days, policy.max_duration_days
        )));
    }

    let total = existing.map(|p| p.amount).unwrap_or(Decimal::ZERO) + amount;
    let rule = policy.tier_for(total).ok_or_else(|| {
        let minimum = policy.tiers.first().map(|t| t.min_amount).unwrap_or(Decimal::ZERO);
        FinovaError::InvalidInput(format!("stake total {} below minimum {}", total, minimum))
    })?;

    Ok(match existing {
        Some(position) => StakePosition {
            id: position.id,
            amount: total,
            duration_days: position.duration_days.max(duration_days),
            started_at: position.started_at,
            tier: rule.tier,
        },
        None => StakePosition {
            id: StakePositionId::generate(),
            amount: total,
            duration_days,
            started_at: now,
            tier: rule.tier,
        },
    })
}

/// Benefits of `position` at `now`
pub fn project(policy: &StakingPolicy, position: &StakePosition, now: i64) -> Result<StakeProjection> {
    let rule = policy.rule(position.tier).ok_or_else(|| {
        FinovaError::Config(format!("no staking rule for tier {}", position.tier))
    })?;
    let days = position.days_staked(now);
    let loyalty = loyalty(policy, days);

    let period = fin_amount(rule.apy * position.duration_days as f64 / 365.0);
    let projected_reward = (position.amount * period).round_dp(FIN_SCALE);

    Ok(StakeProjection {
        tier: rule.tier,
        mining_boost: rule.mining_boost * (1.0 + loyalty),
        xp_multiplier: rule.xp_multiplier,
        rp_bonus: rule.rp_bonus,
        apy: rule.apy,
        loyalty,
        projected_reward,
    })
}

/// Close `position` at `now`, applying the early-exit penalty
pub fn settle(policy: &StakingPolicy, position: &StakePosition, now: i64) -> Unstake {
    let days_staked = position.days_staked(now);
    let penalty = (position.amount * policy.penalty_rate(days_staked)).round_dp(FIN_SCALE);
    Unstake {
        position_id: position.id,
        principal: position.amount,
        penalty,
        released: position.amount - penalty,
        days_staked,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use finova_common::MS_PER_DAY;
    use rust_decimal_macros::dec;

    #[test]
    fn test_open_and_tier() {
        let policy = StakingPolicy::default();
        let position = open_or_top_up(&policy, None, dec!(600), 90, 0).unwrap();
        assert_eq!(position.tier, StakingTier::Premium);
        assert_eq!(position.amount, dec!(600));

        let projection = project(&policy, &position, 0).unwrap();
        assert!((projection.mining_boost - 0.35).abs() < 1e-12);
        // 600 × 0.10 × 90/365
        assert_eq!(projection.projected_reward, (dec!(600) * fin_amount(0.1 * 90.0 / 365.0)).round_dp(8));
    }

    #[test]
    fn test_top_up_keeps_start_and_upgrades_tier() {
        let policy = StakingPolicy::default();
        let first = open_or_top_up(&policy, None, dec!(100), 30, 5).unwrap();
        let topped = open_or_top_up(&policy, Some(&first), dec!(950), 10, 99).unwrap();
        assert_eq!(topped.id, first.id);
        assert_eq!(topped.started_at, 5);
        assert_eq!(topped.duration_days, 30);
        assert_eq!(topped.amount, dec!(1050));
        assert_eq!(topped.tier, StakingTier::Vip);
    }

    #[test]
    fn test_invalid_stakes() {
        let policy = StakingPolicy::default();
        assert!(matches!(
            open_or_top_up(&policy, None, dec!(99), 30, 0),
            Err(FinovaError::InvalidInput(_))
        ));
        assert!(matches!(
            open_or_top_up(&policy, None, dec!(100), 0, 0),
            Err(FinovaError::InvalidInput(_))
        ));
        assert!(matches!(
            open_or_top_up(&policy, None, dec!(100), 1_461, 0),
            Err(FinovaError::InvalidInput(_))
        ));
        assert!(matches!(
            open_or_top_up(&policy, None, dec!(-5), 30, 0),
            Err(FinovaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_loyalty_growth_and_cap() {
        let policy = StakingPolicy::default();
        assert_eq!(loyalty(&policy, 29), 0.0);
        assert!((loyalty(&policy, 60) - 0.01).abs() < 1e-12);
        assert!((loyalty(&policy, 100_000) - 1.0).abs() < 1e-12);

        let rule = policy.rule(StakingTier::Basic).unwrap();
        assert!((mining_boost(&policy, rule, 30) - 0.20 * 1.005).abs() < 1e-12);
    }

    #[test]
    fn test_early_exit_penalty() {
        let policy = StakingPolicy::default();
        let position = open_or_top_up(&policy, None, dec!(1000), 365, 0).unwrap();

        let early = settle(&policy, &position, 10 * MS_PER_DAY);
        assert_eq!(early.penalty, dec!(50));
        assert_eq!(early.released, dec!(950));

        let mid = settle(&policy, &position, 100 * MS_PER_DAY);
        assert_eq!(mid.penalty, dec!(10));

        let late = settle(&policy, &position, 200 * MS_PER_DAY);
        assert_eq!(late.penalty, Decimal::ZERO);
        assert_eq!(late.released, dec!(1000));
    }
}
