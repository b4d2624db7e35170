//! Ledger event payloads
//!
//! Every committed write is recorded as one of these variants. The resulting
//! user states travel alongside in the entry's deltas; the event itself keeps
//! what a replayed call needs to rebuild its response.

use finova_common::{
    ActivityEvent, CardEffect, CardId, CloseReason, GuildId, IdentitySignal, SessionId,
    StakePosition, TrustEvidence, UserId,
};
use finova_rewards::bonus::BonusResolution;
use finova_rewards::{RpDelta, StakeProjection, Unstake, XpDelta};
use finova_trust::TrustUpdate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum LedgerEvent {
    UserRegistered {
        user_id: UserId,
        referral_code: String,
        identity: Option<IdentitySignal>,
    },
    ActivityRecorded {
        activity: ActivityEvent,
        xp: XpDelta,
        bonus: BonusResolution,
        rp: Vec<RpDelta>,
    },
    TrustEvidenceRecorded {
        evidence: TrustEvidence,
        update: TrustUpdate,
        /// Submitted as a proof of humanity
        proof: bool,
    },
    IdentitySignalRecorded {
        signal: IdentitySignal,
        update: TrustUpdate,
    },
    ReferralLinked {
        referrer: UserId,
        referee: UserId,
        code: String,
        signup_bonus: f64,
    },
    MiningStarted {
        session_id: SessionId,
        started_at: i64,
        rate: f64,
    },
    /// Rate change inside an active session not caused by another event
    RateCheckpoint {
        session_id: SessionId,
        at: i64,
        rate: f64,
    },
    MiningStopped {
        session_id: SessionId,
        reason: CloseReason,
        total_mined: Decimal,
        duration_seconds: u64,
        consumed: Vec<CardId>,
        rp: Vec<RpDelta>,
    },
    StakeOpened {
        position: StakePosition,
        amount: Decimal,
        projection: StakeProjection,
    },
    StakeClosed {
        unstake: Unstake,
    },
    CardActivated {
        card: CardEffect,
    },
    /// Expired cards swept from a user's stack
    CardsExpired {
        card_ids: Vec<CardId>,
    },
    GuildJoined {
        guild_id: GuildId,
    },
    GuildLeft {
        guild_id: GuildId,
    },
}

impl LedgerEvent {
    /// Short name for logs and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::UserRegistered { .. } => "user_registered",
            LedgerEvent::ActivityRecorded { .. } => "activity_recorded",
            LedgerEvent::TrustEvidenceRecorded { .. } => "trust_evidence_recorded",
            LedgerEvent::IdentitySignalRecorded { .. } => "identity_signal_recorded",
            LedgerEvent::ReferralLinked { .. } => "referral_linked",
            LedgerEvent::MiningStarted { .. } => "mining_started",
            LedgerEvent::RateCheckpoint { .. } => "rate_checkpoint",
            LedgerEvent::MiningStopped { .. } => "mining_stopped",
            LedgerEvent::StakeOpened { .. } => "stake_opened",
            LedgerEvent::StakeClosed { .. } => "stake_closed",
            LedgerEvent::CardActivated { .. } => "card_activated",
            LedgerEvent::CardsExpired { .. } => "cards_expired",
            LedgerEvent::GuildJoined { .. } => "guild_joined",
            LedgerEvent::GuildLeft { .. } => "guild_left",
        }
    }
}
