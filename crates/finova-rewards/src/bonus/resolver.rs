//! Bonus stack resolution
//!
//! Effects apply in a fixed order: staking tier, then active cards in
//! activation order, then guild. The combined multiplier is capped at
//! `global_cap`; every applied factor is reported for auditing.

use super::effect::{BonusEffect, Modifier, Target};
use crate::staking;
use finova_common::{CardId, RewardPolicy, UserState};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One factor of a resolution, in application order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedBonus {
    pub source: String,
    pub modifier: Modifier,
    /// Running value after this factor
    pub value_after: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusResolution {
    pub target: Target,
    pub base: f64,
    pub final_value: f64,
    pub applied: Vec<AppliedBonus>,
    /// final_value / base
    pub combined_multiplier: f64,
    pub capped: bool,
    /// Cards past expiry; the caller removes them
    pub expired: Vec<CardId>,
    /// Single-use cards that contributed; the committing operation removes them
    pub consumed: Vec<CardId>,
}

/// Effects owned by one user at one instant, in application order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BonusStack {
    pub effects: Vec<BonusEffect>,
    pub expired: Vec<CardId>,
}

impl BonusStack {
    /// Collect the bonus sources of `user` at `now`
    pub fn for_user(user: &UserState, policy: &RewardPolicy, now: i64) -> Self {
        let mut stack = BonusStack::default();

        if let Some(position) = &user.stake {
            if let Some(rule) = policy.staking.rule(position.tier) {
                stack.effects.push(BonusEffect::Staking {
                    tier: position.tier,
                    mining_boost: staking::mining_boost(&policy.staking, rule, position.days_staked(now)),
                    xp_multiplier: rule.xp_multiplier,
                    rp_bonus: rule.rp_bonus,
                });
            }
        }

        for card in &user.cards {
            if card.is_expired(now) {
                stack.expired.push(card.card_id);
            } else {
                stack.effects.push(BonusEffect::from_card(card));
            }
        }

        if let Some(guild_id) = &user.guild {
            stack.effects.push(BonusEffect::Guild {
                guild_id: guild_id.clone(),
                mining_bonus: policy.bonus.guild_mining_bonus,
                xp_bonus: policy.bonus.guild_xp_bonus,
            });
        }

        stack
    }
}

pub struct BonusResolver {
    global_cap: f64,
}

impl BonusResolver {
    pub fn new(global_cap: f64) -> Self {
        Self { global_cap }
    }

    pub fn global_cap(&self) -> f64 {
        self.global_cap
    }

    /// Resolve `base` for `target` through `stack`
    ///
    /// Every modifier is linear in the base, so the stack is folded over a
    /// unit value and the resulting multiplier scaled onto `base`. A zero
    /// base still reports the multiplier the stack would apply.
    pub fn resolve(&self, target: Target, base: f64, stack: &BonusStack) -> BonusResolution {
        let base = if base.is_finite() && base > 0.0 { base } else { 0.0 };

        let mut multiplier = 1.0;
        let mut applied = Vec::new();
        let mut consumed = Vec::new();

        for effect in &stack.effects {
            let Some(modifier) = effect.modifier(target) else {
                continue;
            };
            multiplier = effect.apply(target, multiplier, 1.0);
            if !multiplier.is_finite() || multiplier < 0.0 {
                multiplier = 0.0;
            }
            applied.push(AppliedBonus {
                source: effect.source(),
                modifier,
                value_after: base * multiplier,
            });
            if let Some(card_id) = effect.consumable_card() {
                consumed.push(card_id);
            }
        }

        let capped = multiplier > self.global_cap;
        let combined_multiplier = multiplier.min(self.global_cap);

        debug!(?target, combined_multiplier, capped, sources = applied.len(), "Bonus stack resolved");

        BonusResolution {
            target,
            base,
            final_value: base * combined_multiplier,
            applied,
            combined_multiplier,
            capped,
            expired: stack.expired.clone(),
            consumed,
        }
    }
}
