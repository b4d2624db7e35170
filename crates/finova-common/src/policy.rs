//! Reward policy
//!
//! Every threshold, bonus percentage, decay constant and cap the engine uses
//! lives here as versioned data. The defaults reproduce the live network's
//! constants; deployments override them with a policy file.

use crate::error::{FinovaError, Result};
use crate::types::activity::{ActivityType, Platform};
use crate::types::card::{CardCategory, CardKind, CardUsage, StackingRule};
use crate::types::referral::RpTier;
use crate::types::staking::StakingTier;
use crate::types::trust_score::{EvidenceKind, RiskTier};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Complete, versioned reward policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardPolicy {
    /// Policy version, recorded with every ledger entry it produced
    pub version: u32,
    pub trust: TrustPolicy,
    pub xp: XpPolicy,
    pub referral: ReferralPolicy,
    pub rate: RatePolicy,
    pub bonus: BonusPolicy,
    pub staking: StakingPolicy,
    pub cards: Vec<CardSpec>,
    pub session: SessionPolicy,
    /// Mining requires a verified identity signal
    pub require_identity_for_mining: bool,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self {
            version: 1,
            trust: TrustPolicy::default(),
            xp: XpPolicy::default(),
            referral: ReferralPolicy::default(),
            rate: RatePolicy::default(),
            bonus: BonusPolicy::default(),
            staking: StakingPolicy::default(),
            cards: default_cards(),
            session: SessionPolicy::default(),
            require_identity_for_mining: false,
        }
    }
}

impl RewardPolicy {
    /// Load a policy from JSON
    pub fn from_json(raw: &str) -> Result<Self> {
        let policy: RewardPolicy = serde_json::from_str(raw)?;
        policy.validate()?;
        Ok(policy)
    }

    /// Reject policies that would break engine invariants
    pub fn validate(&self) -> Result<()> {
        self.trust.validate()?;
        self.xp.validate()?;
        self.referral.validate()?;
        self.rate.validate()?;
        self.bonus.validate()?;
        self.staking.validate()?;
        for card in &self.cards {
            card.validate()?;
        }
        if self.session.timeout_secs == 0 {
            return Err(config_err("session.timeout_secs must be positive"));
        }
        Ok(())
    }

    /// Catalog entry for a card kind
    pub fn card(&self, kind: CardKind) -> Option<&CardSpec> {
        self.cards.iter().find(|c| c.kind == kind)
    }
}

fn config_err(msg: impl Into<String>) -> FinovaError {
    FinovaError::Config(msg.into())
}

fn unit_open(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(config_err(format!("{} must be in (0, 1), got {}", name, value)))
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(config_err(format!("{} must be positive, got {}", name, value)))
    }
}

// ============ Trust ============

/// Weight of one evidence kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRule {
    pub kind: EvidenceKind,
    /// Maximum absolute contribution of this kind
    pub weight: f64,
    /// Attributes every evidence item of this kind must carry
    pub required_attributes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustPolicy {
    /// Score before any evidence
    pub baseline: f64,
    /// Below this the user must pass a proof of humanity
    pub humanity_floor: f64,
    /// A passing proof lifts the score to at least `floor + proof_lift`
    pub proof_lift: f64,
    /// Minimum captcha signal that counts as a pass
    pub proof_min_signal: f64,
    /// Diminishing returns factor for repeated evidence of one kind
    pub same_type_damping: f64,
    pub evidence: Vec<EvidenceRule>,
    /// Identity contribution when verified, per risk tier
    pub identity_low_risk: f64,
    pub identity_medium_risk: f64,
    pub identity_high_risk: f64,
}

impl Default for TrustPolicy {
    fn default() -> Self {
        Self {
            baseline: 0.5,
            humanity_floor: 0.30,
            proof_lift: 0.10,
            proof_min_signal: 0.5,
            same_type_damping: 0.5,
            evidence: vec![
                EvidenceRule {
                    kind: EvidenceKind::Biometric,
                    weight: 0.25,
                    required_attributes: vec!["liveness".to_string()],
                },
                EvidenceRule {
                    kind: EvidenceKind::Behavioral,
                    weight: 0.20,
                    required_attributes: vec!["session_pattern".to_string()],
                },
                EvidenceRule {
                    kind: EvidenceKind::SocialGraph,
                    weight: 0.20,
                    required_attributes: vec!["connections".to_string()],
                },
                EvidenceRule {
                    kind: EvidenceKind::Captcha,
                    weight: 0.15,
                    required_attributes: vec!["challenge_id".to_string(), "passed".to_string()],
                },
            ],
            identity_low_risk: 0.10,
            identity_medium_risk: 0.05,
            identity_high_risk: -0.05,
        }
    }
}

impl TrustPolicy {
    pub fn rule(&self, kind: EvidenceKind) -> Option<&EvidenceRule> {
        self.evidence.iter().find(|r| r.kind == kind)
    }

    pub fn identity_contribution(&self, risk_tier: RiskTier) -> f64 {
        match risk_tier {
            RiskTier::Low => self.identity_low_risk,
            RiskTier::Medium => self.identity_medium_risk,
            RiskTier::High => self.identity_high_risk,
        }
    }

    fn validate(&self) -> Result<()> {
        unit_open("trust.baseline", self.baseline)?;
        unit_open("trust.humanity_floor", self.humanity_floor)?;
        unit_open("trust.same_type_damping", self.same_type_damping)?;
        if !(0.0..=1.0).contains(&(self.humanity_floor + self.proof_lift)) {
            return Err(config_err("trust.proof_lift pushes the floor outside [0, 1]"));
        }
        for rule in &self.evidence {
            positive("trust.evidence.weight", rule.weight)?;
        }
        Ok(())
    }
}

// ============ XP ============

/// Supported (platform, activity type) pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRule {
    pub platform: Platform,
    pub activity_type: ActivityType,
    pub base_xp: u64,
    /// Payload schema version these fields belong to
    pub schema_version: u16,
    pub required_fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformMultiplier {
    pub platform: Platform,
    pub multiplier: f64,
}

/// Weights of the payload quality signals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityWeights {
    pub originality: f64,
    pub engagement: f64,
    pub brand_safety: f64,
    pub human_generated: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            originality: 0.35,
            engagement: 0.30,
            brand_safety: 0.20,
            human_generated: 0.15,
        }
    }
}

/// Cumulative XP required to reach each level
///
/// `thresholds[i]` is the XP needed for level `i + 1`; the first entry is 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelCurve {
    pub thresholds: Vec<u64>,
}

impl LevelCurve {
    /// Geometric curve: the increment for level n+1 is `first × growth^(n-1)`
    pub fn geometric(first_increment: f64, growth: f64, levels: usize) -> Self {
        let mut thresholds = Vec::with_capacity(levels);
        let mut total = 0u64;
        thresholds.push(0);
        for i in 0..levels.saturating_sub(1) {
            let increment = (first_increment * growth.powi(i as i32)).round() as u64;
            total += increment;
            thresholds.push(total);
        }
        Self { thresholds }
    }

    /// Level reached with `xp` cumulative points
    pub fn level_for(&self, xp: u64) -> u32 {
        self.thresholds.partition_point(|t| *t <= xp).max(1) as u32
    }

    pub fn max_level(&self) -> u32 {
        self.thresholds.len() as u32
    }

    /// Thresholds must start at zero, increase strictly and grow strictly
    /// larger increments
    pub fn validate(&self) -> Result<()> {
        if self.thresholds.first() != Some(&0) {
            return Err(config_err("level curve must start at 0 XP"));
        }
        let mut previous_increment = 0u64;
        for pair in self.thresholds.windows(2) {
            if pair[1] <= pair[0] {
                return Err(config_err("level thresholds must be strictly increasing"));
            }
            let increment = pair[1] - pair[0];
            if increment <= previous_increment {
                return Err(config_err("level increments must be strictly increasing"));
            }
            previous_increment = increment;
        }
        Ok(())
    }
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::geometric(100.0, 1.08, 100)
    }
}

/// Multiplier reached after `min_days` consecutive streak days
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreakTier {
    pub min_days: u32,
    pub multiplier: f64,
}

/// Daily activity streak
///
/// An activity at least `min_gap_secs` after the last counted one extends
/// the streak by a day; one later than `continue_secs` starts over at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreakPolicy {
    pub min_gap_secs: u64,
    pub continue_secs: u64,
    /// Ascending by `min_days`
    pub tiers: Vec<StreakTier>,
}

impl Default for StreakPolicy {
    fn default() -> Self {
        let tier = |min_days, multiplier| StreakTier { min_days, multiplier };
        Self {
            min_gap_secs: 82_800,
            continue_secs: 172_800,
            tiers: vec![
                tier(7, 1.1),
                tier(14, 1.25),
                tier(30, 1.5),
                tier(60, 2.0),
                tier(100, 2.5),
                tier(200, 3.0),
            ],
        }
    }
}

impl StreakPolicy {
    pub fn multiplier_for(&self, days: u32) -> f64 {
        self.tiers
            .iter()
            .rev()
            .find(|t| days >= t.min_days)
            .map(|t| t.multiplier)
            .unwrap_or(1.0)
    }

    pub fn min_gap_ms(&self) -> i64 {
        self.min_gap_secs as i64 * 1_000
    }

    pub fn continue_ms(&self) -> i64 {
        self.continue_secs as i64 * 1_000
    }

    fn validate(&self) -> Result<()> {
        if self.min_gap_secs == 0 || self.continue_secs <= self.min_gap_secs {
            return Err(config_err("xp.streak needs 0 < min_gap_secs < continue_secs"));
        }
        let mut last = (0u32, 1.0f64);
        for tier in &self.tiers {
            if !tier.multiplier.is_finite() || tier.min_days <= last.0 || tier.multiplier < last.1 {
                return Err(config_err(
                    "xp.streak tiers must ascend in days with non-decreasing multipliers >= 1",
                ));
            }
            last = (tier.min_days, tier.multiplier);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct XpPolicy {
    pub rules: Vec<ActivityRule>,
    pub platform_multipliers: Vec<PlatformMultiplier>,
    pub quality_weights: QualityWeights,
    /// Quality score 0 maps to `quality_min`, 1 maps to `quality_max`
    pub quality_min: f64,
    pub quality_max: f64,
    /// Level damping `max(e^(-k × level), floor)`
    pub level_damping_k: f64,
    pub level_damping_floor: f64,
    /// Factor applied per same-pair award inside the window
    pub repetition_decay: f64,
    pub window_secs: u64,
    /// Maximum XP per platform inside the window
    pub platform_daily_cap: u64,
    pub level_curve: LevelCurve,
    pub streak: StreakPolicy,
}

impl Default for XpPolicy {
    fn default() -> Self {
        Self {
            rules: default_activity_rules(),
            platform_multipliers: vec![
                PlatformMultiplier { platform: Platform::TikTok, multiplier: 1.3 },
                PlatformMultiplier { platform: Platform::Instagram, multiplier: 1.2 },
                PlatformMultiplier { platform: Platform::YouTube, multiplier: 1.4 },
                PlatformMultiplier { platform: Platform::X, multiplier: 1.2 },
                PlatformMultiplier { platform: Platform::Facebook, multiplier: 1.1 },
                PlatformMultiplier { platform: Platform::App, multiplier: 1.0 },
            ],
            quality_weights: QualityWeights::default(),
            quality_min: 0.5,
            quality_max: 2.0,
            level_damping_k: 0.01,
            level_damping_floor: 0.1,
            repetition_decay: 0.8,
            window_secs: 86_400,
            platform_daily_cap: 2_000,
            level_curve: LevelCurve::default(),
            streak: StreakPolicy::default(),
        }
    }
}

impl XpPolicy {
    pub fn rule(&self, platform: Platform, activity_type: ActivityType) -> Option<&ActivityRule> {
        self.rules
            .iter()
            .find(|r| r.platform == platform && r.activity_type == activity_type)
    }

    pub fn platform_multiplier(&self, platform: Platform) -> f64 {
        self.platform_multipliers
            .iter()
            .find(|p| p.platform == platform)
            .map(|p| p.multiplier)
            .unwrap_or(1.0)
    }

    pub fn window_ms(&self) -> i64 {
        self.window_secs as i64 * 1_000
    }

    fn validate(&self) -> Result<()> {
        self.level_curve.validate()?;
        self.streak.validate()?;
        unit_open("xp.repetition_decay", self.repetition_decay)?;
        positive("xp.quality_min", self.quality_min)?;
        if self.quality_max < self.quality_min {
            return Err(config_err("xp.quality_max must be >= quality_min"));
        }
        if self.platform_daily_cap == 0 || self.window_secs == 0 {
            return Err(config_err("xp cap and window must be positive"));
        }
        Ok(())
    }
}

fn default_base_xp(activity_type: ActivityType) -> u64 {
    match activity_type {
        ActivityType::OriginalPost => 50,
        ActivityType::PhotoPost => 75,
        ActivityType::VideoPost => 150,
        ActivityType::Story => 25,
        ActivityType::Comment => 25,
        ActivityType::Like => 5,
        ActivityType::Share => 15,
        ActivityType::Follow => 20,
        ActivityType::DailyLogin => 10,
        ActivityType::DailyQuest => 100,
        ActivityType::Milestone => 500,
        ActivityType::ViralContent => 1_000,
    }
}

fn default_required_fields(activity_type: ActivityType) -> Vec<String> {
    let fields: &[&str] = match activity_type {
        ActivityType::OriginalPost
        | ActivityType::PhotoPost
        | ActivityType::VideoPost
        | ActivityType::Story
        | ActivityType::Comment => &["content_id"],
        ActivityType::Like | ActivityType::Share | ActivityType::Follow => &["target_id"],
        ActivityType::ViralContent => &["content_id", "views"],
        ActivityType::DailyQuest => &["quest_id"],
        ActivityType::Milestone => &["milestone_id"],
        ActivityType::DailyLogin => &[],
    };
    fields.iter().map(|f| f.to_string()).collect()
}

fn default_activity_rules() -> Vec<ActivityRule> {
    use ActivityType::*;

    let social: &[(Platform, &[ActivityType])] = &[
        (
            Platform::TikTok,
            &[OriginalPost, VideoPost, Story, Comment, Like, Share, Follow, ViralContent],
        ),
        (
            Platform::Instagram,
            &[OriginalPost, PhotoPost, VideoPost, Story, Comment, Like, Share, Follow, ViralContent],
        ),
        (
            Platform::YouTube,
            &[VideoPost, Comment, Like, Share, Follow, ViralContent],
        ),
        (
            Platform::X,
            &[OriginalPost, PhotoPost, VideoPost, Comment, Like, Share, Follow, ViralContent],
        ),
        (
            Platform::Facebook,
            &[OriginalPost, PhotoPost, VideoPost, Story, Comment, Like, Share, Follow, ViralContent],
        ),
        (Platform::App, &[DailyLogin, DailyQuest, Milestone]),
    ];

    social
        .iter()
        .flat_map(|(platform, types)| {
            types.iter().map(move |t| ActivityRule {
                platform: *platform,
                activity_type: *t,
                base_xp: default_base_xp(*t),
                schema_version: 1,
                required_fields: default_required_fields(*t),
            })
        })
        .collect()
}

// ============ Referral ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpTierRule {
    pub tier: RpTier,
    pub min_rp: f64,
    pub min_active_referees: u32,
    /// Multiplier fed into the mining rate
    pub bonus: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferralPolicy {
    /// Per-depth regression; depth 0 is the direct referrer
    pub decay: f64,
    pub max_depth: u32,
    /// Share of a descendant's XP paid as RP
    pub xp_share: f64,
    /// Share of a descendant's mined FIN paid as RP
    pub mining_share: f64,
    /// Contributions below this are dropped
    pub min_contribution: f64,
    /// RP granted to the referrer when an edge is created
    pub signup_bonus: f64,
    /// Referees inactive for longer stop counting towards tiers
    pub dormancy_days: u32,
    /// Network regression `e^(-k × network_size × quality)`
    pub network_regression_k: f64,
    /// Floor of the network regression for very large networks
    pub min_network_regression: f64,
    /// Ascending tier table
    pub tiers: Vec<RpTierRule>,
}

impl Default for ReferralPolicy {
    fn default() -> Self {
        Self {
            decay: 0.5,
            max_depth: 10,
            xp_share: 0.05,
            mining_share: 0.10,
            min_contribution: 1e-9,
            signup_bonus: 50.0,
            dormancy_days: 30,
            network_regression_k: 0.0001,
            min_network_regression: 0.05,
            tiers: vec![
                RpTierRule { tier: RpTier::Bronze, min_rp: 0.0, min_active_referees: 0, bonus: 1.0 },
                RpTierRule { tier: RpTier::Silver, min_rp: 1_000.0, min_active_referees: 1, bonus: 1.2 },
                RpTierRule { tier: RpTier::Gold, min_rp: 5_000.0, min_active_referees: 3, bonus: 1.5 },
                RpTierRule { tier: RpTier::Platinum, min_rp: 15_000.0, min_active_referees: 10, bonus: 2.0 },
                RpTierRule { tier: RpTier::Diamond, min_rp: 50_000.0, min_active_referees: 25, bonus: 3.0 },
            ],
        }
    }
}

impl ReferralPolicy {
    pub fn dormancy_ms(&self) -> i64 {
        self.dormancy_days as i64 * 86_400_000
    }

    pub fn tier_bonus(&self, tier: RpTier) -> f64 {
        self.tiers
            .iter()
            .find(|t| t.tier == tier)
            .map(|t| t.bonus)
            .unwrap_or(1.0)
    }

    fn validate(&self) -> Result<()> {
        unit_open("referral.decay", self.decay)?;
        positive("referral.xp_share", self.xp_share)?;
        positive("referral.mining_share", self.mining_share)?;
        if !self.network_regression_k.is_finite() || self.network_regression_k < 0.0 {
            return Err(config_err("referral.network_regression_k must be non-negative"));
        }
        unit_open("referral.min_network_regression", self.min_network_regression)?;
        if self.tiers.is_empty() {
            return Err(config_err("referral.tiers must not be empty"));
        }
        for pair in self.tiers.windows(2) {
            if pair[1].min_rp < pair[0].min_rp
                || pair[1].min_active_referees < pair[0].min_active_referees
                || pair[1].bonus < pair[0].bonus
            {
                return Err(config_err("referral tiers must be ascending"));
            }
        }
        Ok(())
    }
}

// ============ Rate ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatePolicy {
    /// FIN per second
    pub base_rate: f64,
    pub max_rate: f64,
    pub finizen_max: f64,
    pub finizen_user_scale: f64,
    /// Regression `e^(-k × holdings)`
    pub regression_k: f64,
    /// At or above this trust score the security factor is 1.0
    pub security_full_threshold: f64,
    /// Security factor between the humanity floor and the full threshold
    pub security_partial: f64,
    pub xp_level_step: f64,
    pub xp_level_cap: f64,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            base_rate: 0.05,
            max_rate: 1.0,
            finizen_max: 2.0,
            finizen_user_scale: 1_000_000.0,
            regression_k: 0.001,
            security_full_threshold: 0.80,
            security_partial: 0.8,
            xp_level_step: 0.01,
            xp_level_cap: 2.0,
        }
    }
}

impl RatePolicy {
    fn validate(&self) -> Result<()> {
        positive("rate.base_rate", self.base_rate)?;
        positive("rate.max_rate", self.max_rate)?;
        positive("rate.finizen_user_scale", self.finizen_user_scale)?;
        if self.regression_k < 0.0 || !self.regression_k.is_finite() {
            return Err(config_err("rate.regression_k must be >= 0"));
        }
        if self.finizen_max < 1.0 {
            return Err(config_err("rate.finizen_max must be >= 1"));
        }
        Ok(())
    }
}

// ============ Bonus / guild ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BonusPolicy {
    /// Final value never exceeds `base × global_cap`
    pub global_cap: f64,
    pub guild_mining_bonus: f64,
    pub guild_xp_bonus: f64,
    pub max_guild_size: usize,
}

impl Default for BonusPolicy {
    fn default() -> Self {
        Self {
            global_cap: 6.0,
            guild_mining_bonus: 0.15,
            guild_xp_bonus: 0.20,
            max_guild_size: 50,
        }
    }
}

impl BonusPolicy {
    fn validate(&self) -> Result<()> {
        if !(self.global_cap >= 1.0 && self.global_cap.is_finite()) {
            return Err(config_err("bonus.global_cap must be >= 1"));
        }
        if self.max_guild_size == 0 {
            return Err(config_err("bonus.max_guild_size must be positive"));
        }
        Ok(())
    }
}

// ============ Staking ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakingTierRule {
    pub tier: StakingTier,
    pub min_amount: Decimal,
    /// Additive mining boost (0.20 = +20%)
    pub mining_boost: f64,
    pub xp_multiplier: f64,
    /// Additive RP boost
    pub rp_bonus: f64,
    pub apy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnstakePenalty {
    /// Applies when the position is younger than this
    pub before_days: u32,
    pub rate: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StakingPolicy {
    /// Ascending tier table
    pub tiers: Vec<StakingTierRule>,
    /// Extra fraction of the mining boost per 30 staked days
    pub loyalty_step: f64,
    pub loyalty_cap: f64,
    pub min_duration_days: u32,
    pub max_duration_days: u32,
    /// Ascending by `before_days`
    pub penalties: Vec<UnstakePenalty>,
}

impl Default for StakingPolicy {
    fn default() -> Self {
        let tier = |tier, min_amount: i64, mining_boost, xp_multiplier, rp_bonus, apy| StakingTierRule {
            tier,
            min_amount: Decimal::from(min_amount),
            mining_boost,
            xp_multiplier,
            rp_bonus,
            apy,
        };
        Self {
            tiers: vec![
                tier(StakingTier::Basic, 100, 0.20, 1.10, 0.05, 0.08),
                tier(StakingTier::Premium, 500, 0.35, 1.20, 0.10, 0.10),
                tier(StakingTier::Vip, 1_000, 0.50, 1.30, 0.20, 0.12),
                tier(StakingTier::Elite, 5_000, 0.75, 1.50, 0.35, 0.14),
                tier(StakingTier::Whale, 10_000, 1.00, 1.75, 0.50, 0.15),
            ],
            loyalty_step: 0.005,
            loyalty_cap: 1.0,
            min_duration_days: 1,
            max_duration_days: 1_460,
            penalties: vec![
                UnstakePenalty { before_days: 30, rate: Decimal::new(5, 2) },
                UnstakePenalty { before_days: 90, rate: Decimal::new(3, 2) },
                UnstakePenalty { before_days: 180, rate: Decimal::new(1, 2) },
            ],
        }
    }
}

impl StakingPolicy {
    /// Highest tier whose minimum is met
    pub fn tier_for(&self, amount: Decimal) -> Option<&StakingTierRule> {
        self.tiers.iter().rev().find(|t| amount >= t.min_amount)
    }

    pub fn rule(&self, tier: StakingTier) -> Option<&StakingTierRule> {
        self.tiers.iter().find(|t| t.tier == tier)
    }

    /// Early-exit penalty rate for a position open `days_staked` days
    pub fn penalty_rate(&self, days_staked: u32) -> Decimal {
        self.penalties
            .iter()
            .find(|p| days_staked < p.before_days)
            .map(|p| p.rate)
            .unwrap_or(Decimal::ZERO)
    }

    fn validate(&self) -> Result<()> {
        if self.tiers.is_empty() {
            return Err(config_err("staking.tiers must not be empty"));
        }
        for pair in self.tiers.windows(2) {
            if pair[1].min_amount <= pair[0].min_amount {
                return Err(config_err("staking tier minimums must be strictly increasing"));
            }
        }
        if self.min_duration_days == 0 || self.max_duration_days < self.min_duration_days {
            return Err(config_err("staking duration bounds are invalid"));
        }
        Ok(())
    }
}

// ============ Cards ============

/// Catalog entry for a card kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSpec {
    pub kind: CardKind,
    pub category: CardCategory,
    pub stacking: StackingRule,
    pub magnitude: f64,
    pub duration_secs: u64,
    pub usage: CardUsage,
}

impl CardSpec {
    fn validate(&self) -> Result<()> {
        positive("card.magnitude", self.magnitude)?;
        if self.duration_secs == 0 {
            return Err(config_err(format!("card {:?} has zero duration", self.kind)));
        }
        Ok(())
    }
}

fn default_cards() -> Vec<CardSpec> {
    let card = |kind, category, stacking, magnitude, duration_secs, usage| CardSpec {
        kind,
        category,
        stacking,
        magnitude,
        duration_secs,
        usage,
    };
    use CardCategory::*;
    use StackingRule::*;
    vec![
        card(CardKind::DoubleMining, MiningBoost, Multiplicative, 2.0, 86_400, CardUsage::Reusable),
        card(CardKind::TripleMining, MiningBoost, Multiplicative, 3.0, 43_200, CardUsage::Reusable),
        card(CardKind::MiningFrenzy, MiningBoost, Multiplicative, 6.0, 14_400, CardUsage::Reusable),
        card(CardKind::EternalMiner, MiningBoost, Multiplicative, 1.5, 2_592_000, CardUsage::Reusable),
        card(CardKind::XpDouble, XpAccelerator, Multiplicative, 2.0, 86_400, CardUsage::Reusable),
        card(CardKind::ReferralBoost, ReferralPower, Multiplicative, 1.5, 604_800, CardUsage::Reusable),
        card(CardKind::MiningBoost10, MiningBoost, Additive, 0.10, 86_400, CardUsage::SingleUse),
    ]
}

// ============ Session ============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    /// Sessions stop accruing this long after start
    pub timeout_secs: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self { timeout_secs: 86_400 }
    }
}
