//! Special card effects owned by a user while active

use super::ids::CardId;
use serde::{Deserialize, Serialize};

/// Catalog card kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    DoubleMining,
    TripleMining,
    MiningFrenzy,
    EternalMiner,
    XpDouble,
    ReferralBoost,
    /// +10% mining, single use
    MiningBoost10,
}

/// What a card boosts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardCategory {
    MiningBoost,
    XpAccelerator,
    ReferralPower,
}

/// How the magnitude combines with the running value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackingRule {
    /// value × magnitude
    Multiplicative,
    /// value + magnitude × base
    Additive,
}

/// Whether a card survives being applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardUsage {
    /// Active until expiry
    Reusable,
    /// Consumed by the first committing operation it contributes to
    SingleUse,
}

/// An activated card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardEffect {
    pub card_id: CardId,
    pub kind: CardKind,
    pub category: CardCategory,
    pub stacking: StackingRule,
    pub magnitude: f64,
    pub usage: CardUsage,
    pub activated_at: i64,
    /// Expiry (Unix millis); the card is pruned at or after this instant
    pub expires_at: i64,
}

impl CardEffect {
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_expiry_boundary() {
        let card = CardEffect {
            card_id: CardId::generate(),
            kind: CardKind::DoubleMining,
            category: CardCategory::MiningBoost,
            stacking: StackingRule::Multiplicative,
            magnitude: 2.0,
            usage: CardUsage::Reusable,
            activated_at: 0,
            expires_at: 1_000,
        };
        assert!(!card.is_expired(999));
        assert!(card.is_expired(1_000));
    }
}
