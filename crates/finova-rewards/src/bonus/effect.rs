//! Bonus effects
//!
//! A closed set of effect variants, each yielding at most one modifier per
//! target. Dispatch is by variant; there is no open-ended effect trait.

use finova_common::{CardCategory, CardEffect, CardId, CardUsage, GuildId, StackingRule, StakingTier};
use serde::{Deserialize, Serialize};

/// Quantity a bonus applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    MiningRate,
    Xp,
    ReferralPoints,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Modifier {
    /// running × m
    Multiplicative(f64),
    /// running + p × base
    Additive(f64),
}

impl Modifier {
    pub fn apply(&self, running: f64, base: f64) -> f64 {
        match self {
            Modifier::Multiplicative(m) => running * m,
            Modifier::Additive(p) => running + p * base,
        }
    }

    fn from_card(stacking: StackingRule, magnitude: f64) -> Self {
        match stacking {
            StackingRule::Multiplicative => Modifier::Multiplicative(magnitude),
            StackingRule::Additive => Modifier::Additive(magnitude),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BonusEffect {
    Staking {
        tier: StakingTier,
        /// Additive mining boost including loyalty
        mining_boost: f64,
        xp_multiplier: f64,
        rp_bonus: f64,
    },
    MiningBoost {
        card_id: CardId,
        stacking: StackingRule,
        magnitude: f64,
        single_use: bool,
    },
    XpAccelerator {
        card_id: CardId,
        stacking: StackingRule,
        magnitude: f64,
        single_use: bool,
    },
    ReferralPower {
        card_id: CardId,
        stacking: StackingRule,
        magnitude: f64,
        single_use: bool,
    },
    Guild {
        guild_id: GuildId,
        mining_bonus: f64,
        xp_bonus: f64,
    },
}

impl BonusEffect {
    pub fn from_card(card: &CardEffect) -> Self {
        let single_use = card.usage == CardUsage::SingleUse;
        match card.category {
            CardCategory::MiningBoost => BonusEffect::MiningBoost {
                card_id: card.card_id,
                stacking: card.stacking,
                magnitude: card.magnitude,
                single_use,
            },
            CardCategory::XpAccelerator => BonusEffect::XpAccelerator {
                card_id: card.card_id,
                stacking: card.stacking,
                magnitude: card.magnitude,
                single_use,
            },
            CardCategory::ReferralPower => BonusEffect::ReferralPower {
                card_id: card.card_id,
                stacking: card.stacking,
                magnitude: card.magnitude,
                single_use,
            },
        }
    }

    /// Modifier this effect contributes to `target`, if any
    pub fn modifier(&self, target: Target) -> Option<Modifier> {
        match (self, target) {
            (BonusEffect::Staking { mining_boost, .. }, Target::MiningRate) => {
                Some(Modifier::Additive(*mining_boost))
            }
            (BonusEffect::Staking { xp_multiplier, .. }, Target::Xp) => {
                Some(Modifier::Multiplicative(*xp_multiplier))
            }
            (BonusEffect::Staking { rp_bonus, .. }, Target::ReferralPoints) => {
                Some(Modifier::Additive(*rp_bonus))
            }
            (BonusEffect::MiningBoost { stacking, magnitude, .. }, Target::MiningRate)
            | (BonusEffect::XpAccelerator { stacking, magnitude, .. }, Target::Xp)
            | (BonusEffect::ReferralPower { stacking, magnitude, .. }, Target::ReferralPoints) => {
                Some(Modifier::from_card(*stacking, *magnitude))
            }
            (BonusEffect::Guild { mining_bonus, .. }, Target::MiningRate) => {
                Some(Modifier::Additive(*mining_bonus))
            }
            (BonusEffect::Guild { xp_bonus, .. }, Target::Xp) => Some(Modifier::Additive(*xp_bonus)),
            _ => None,
        }
    }

    /// `apply(value)` for `target`; effects that don't touch the target pass it through
    pub fn apply(&self, target: Target, running: f64, base: f64) -> f64 {
        self.modifier(target)
            .map(|m| m.apply(running, base))
            .unwrap_or(running)
    }

    /// Card consumed by applying this effect
    pub fn consumable_card(&self) -> Option<CardId> {
        match self {
            BonusEffect::MiningBoost { card_id, single_use: true, .. }
            | BonusEffect::XpAccelerator { card_id, single_use: true, .. }
            | BonusEffect::ReferralPower { card_id, single_use: true, .. } => Some(*card_id),
            _ => None,
        }
    }

    /// Human-readable source label for breakdowns
    pub fn source(&self) -> String {
        match self {
            BonusEffect::Staking { tier, .. } => format!("staking:{}", tier),
            BonusEffect::MiningBoost { card_id, .. } => format!("card:mining:{}", card_id),
            BonusEffect::XpAccelerator { card_id, .. } => format!("card:xp:{}", card_id),
            BonusEffect::ReferralPower { card_id, .. } => format!("card:referral:{}", card_id),
            BonusEffect::Guild { guild_id, .. } => format!("guild:{}", guild_id),
        }
    }
}
