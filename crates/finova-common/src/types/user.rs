//! Per-user aggregate state
//!
//! Every field is a projection of the event ledger. The engine publishes a
//! new immutable `UserState` per committed write; readers never see a
//! partially applied update.

use super::activity::{ActivityType, Platform};
use super::card::CardEffect;
use super::ids::{GuildId, UserId};
use super::session::MiningSession;
use super::staking::StakePosition;
use super::trust_score::TrustScore;
use super::wallet::FinWallet;
use serde::{Deserialize, Serialize};

/// One XP award kept for repetition decay and the platform cap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpAward {
    pub at: i64,
    pub platform: Platform,
    pub activity_type: ActivityType,
    pub xp: u64,
}

/// Experience progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XpProgress {
    pub total_xp: u64,
    /// 1-based level derived from `total_xp`
    pub level: u32,
    /// Awards inside the rolling window, oldest first
    pub recent: Vec<XpAward>,
    /// Consecutive streak days, counting the current one
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    /// Activity that last counted toward the streak
    #[serde(default)]
    pub streak_at: Option<i64>,
}

impl Default for XpProgress {
    fn default() -> Self {
        Self {
            total_xp: 0,
            level: 1,
            recent: Vec::new(),
            current_streak: 0,
            longest_streak: 0,
            streak_at: None,
        }
    }
}

impl XpProgress {
    /// Count an activity at `now` toward the daily streak
    pub fn advance_streak(&mut self, now: i64, min_gap_ms: i64, continue_ms: i64) {
        match self.streak_at {
            Some(last) if now - last < min_gap_ms => return,
            Some(last) if now - last <= continue_ms => {
                self.current_streak = self.current_streak.saturating_add(1);
            }
            _ => self.current_streak = 1,
        }
        self.streak_at = Some(now);
        self.longest_streak = self.longest_streak.max(self.current_streak);
    }

    /// Drop awards that fell out of the window ending at `now`
    pub fn prune(&mut self, now: i64, window_ms: i64) {
        self.recent.retain(|a| now - a.at < window_ms);
    }

    /// Awards already granted for the pair inside the window
    pub fn repetitions(&self, platform: Platform, activity_type: ActivityType) -> usize {
        self.recent
            .iter()
            .filter(|a| a.platform == platform && a.activity_type == activity_type)
            .count()
    }

    /// XP already granted on a platform inside the window
    pub fn platform_total(&self, platform: Platform) -> u64 {
        self.recent
            .iter()
            .filter(|a| a.platform == platform)
            .map(|a| a.xp)
            .sum()
    }
}

/// Everything the engine knows about one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    pub user_id: UserId,
    pub xp: XpProgress,
    /// Accumulated Referral Points
    pub rp: f64,
    pub trust: TrustScore,
    pub wallet: FinWallet,
    pub stake: Option<StakePosition>,
    /// Current or most recently closed session
    pub session: Option<MiningSession>,
    /// Activated cards, in activation order
    pub cards: Vec<CardEffect>,
    pub guild: Option<GuildId>,
    pub referrer: Option<UserId>,
    /// Code other users enter to be referred by this user
    pub referral_code: String,
    pub created_at: i64,
    /// Last reward-affecting activity; drives referral dormancy
    pub last_active_at: i64,
    /// Bumped on every committed write
    pub version: u64,
}

impl UserState {
    pub fn new(user_id: UserId, now: i64) -> Self {
        Self {
            user_id,
            xp: XpProgress::default(),
            rp: 0.0,
            trust: TrustScore::new(now),
            wallet: FinWallet::new(),
            stake: None,
            session: None,
            cards: Vec::new(),
            guild: None,
            referrer: None,
            referral_code: String::new(),
            created_at: now,
            last_active_at: now,
            version: 0,
        }
    }

    /// The session if it is still Active
    pub fn active_session(&self) -> Option<&MiningSession> {
        self.session.as_ref().filter(|s| s.is_active())
    }

    pub fn has_active_session(&self) -> bool {
        self.active_session().is_some()
    }

    /// Whether the user counts as an active referee at `now`
    pub fn is_active_within(&self, now: i64, window_ms: i64) -> bool {
        now - self.last_active_at <= window_ms
    }
}
