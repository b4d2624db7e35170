//! Staking, cards and guild membership

use super::{RewardEngine, StakeReceipt};
use crate::events::LedgerEvent;
use finova_common::{
    CardEffect, CardId, CardKind, EventId, FinovaError, GuildId, Result, UserId,
};
use finova_ledger::{AppendOutcome, LedgerEntry};
use finova_rewards::{staking, Unstake};
use rust_decimal::Decimal;
use tracing::{info, instrument};

impl RewardEngine {
    /// Lock FIN into the user's staking position, opening it if needed
    #[instrument(skip(self), fields(user_id = %user_id, %amount, event_id = %event_id))]
    pub async fn stake_fin(
        &self,
        user_id: &UserId,
        amount: Decimal,
        duration_days: u32,
        event_id: EventId,
    ) -> Result<StakeReceipt> {
        if let Some(entry) = self.prior(&event_id) {
            return replayed_stake(&entry, user_id);
        }
        let scope = self.begin(user_id, &[]).await?;
        if let Some(entry) = self.prior(&event_id) {
            return replayed_stake(&entry, user_id);
        }
        let now = scope.now;
        let policy = &self.policy.staking;

        let mut draft = self.draft(&scope)?;
        let state = draft.user(user_id)?;
        let position = staking::open_or_top_up(policy, state.stake.as_ref(), amount, duration_days, now)?;
        state.wallet.lock(amount)?;
        let projection = staking::project(policy, &position, now)?;
        state.stake = Some(position.clone());
        draft.gain(user_id, 0, 0.0, -amount);

        let receipt = StakeReceipt {
            stake_position_id: position.id,
            tier: position.tier,
            staked: position.amount,
            projected_bonus: projection.clone(),
        };
        let event = LedgerEvent::StakeOpened {
            position,
            amount,
            projection,
        };
        if let AppendOutcome::Duplicate(entry) = self.commit(event_id, user_id, event, draft).await? {
            return replayed_stake(&entry, user_id);
        }

        info!(tier = %receipt.tier, staked = %receipt.staked, "Stake recorded");
        Ok(receipt)
    }

    /// Close the staking position, forfeiting the early-exit penalty
    #[instrument(skip(self), fields(user_id = %user_id, event_id = %event_id))]
    pub async fn unstake(&self, user_id: &UserId, event_id: EventId) -> Result<Unstake> {
        if let Some(entry) = self.prior(&event_id) {
            return replayed_unstake(&entry, user_id);
        }
        let scope = self.begin(user_id, &[]).await?;
        if let Some(entry) = self.prior(&event_id) {
            return replayed_unstake(&entry, user_id);
        }
        let now = scope.now;

        let mut draft = self.draft(&scope)?;
        let state = draft.user(user_id)?;
        let position = state
            .stake
            .take()
            .ok_or_else(|| FinovaError::InvalidInput("no open staking position".into()))?;
        let unstake = staking::settle(&self.policy.staking, &position, now);
        state.wallet.release(unstake.principal, unstake.penalty)?;
        draft.gain(user_id, 0, 0.0, unstake.released);

        let event = LedgerEvent::StakeClosed {
            unstake: unstake.clone(),
        };
        if let AppendOutcome::Duplicate(entry) = self.commit(event_id, user_id, event, draft).await? {
            return replayed_unstake(&entry, user_id);
        }

        info!(
            released = %unstake.released,
            penalty = %unstake.penalty,
            days_staked = unstake.days_staked,
            "Stake closed"
        );
        Ok(unstake)
    }

    /// Activate a card from the policy catalog
    #[instrument(skip(self), fields(user_id = %user_id, ?kind, event_id = %event_id))]
    pub async fn use_card(
        &self,
        user_id: &UserId,
        kind: CardKind,
        event_id: EventId,
    ) -> Result<CardEffect> {
        if let Some(entry) = self.prior(&event_id) {
            return replayed_card(&entry, user_id);
        }
        let spec = self
            .policy
            .card(kind)
            .ok_or_else(|| FinovaError::InvalidInput(format!("card {:?} is not in the catalog", kind)))?;

        let scope = self.begin(user_id, &[]).await?;
        if let Some(entry) = self.prior(&event_id) {
            return replayed_card(&entry, user_id);
        }
        let now = scope.now;

        let card = CardEffect {
            card_id: CardId::generate(),
            kind,
            category: spec.category,
            stacking: spec.stacking,
            magnitude: spec.magnitude,
            usage: spec.usage,
            activated_at: now,
            expires_at: now.saturating_add((spec.duration_secs as i64).saturating_mul(1_000)),
        };

        let mut draft = self.draft(&scope)?;
        draft.user(user_id)?.cards.push(card.clone());

        let event = LedgerEvent::CardActivated { card: card.clone() };
        if let AppendOutcome::Duplicate(entry) = self.commit(event_id, user_id, event, draft).await? {
            return replayed_card(&entry, user_id);
        }

        info!(card_id = %card.card_id, expires_at = card.expires_at, "Card activated");
        Ok(card)
    }

    #[instrument(skip(self), fields(user_id = %user_id, %guild_id, event_id = %event_id))]
    pub async fn join_guild(&self, user_id: &UserId, guild_id: GuildId, event_id: EventId) -> Result<()> {
        if let Some(entry) = self.prior(&event_id) {
            return replayed_guild(&entry, user_id);
        }
        let scope = self.begin(user_id, &[]).await?;
        if let Some(entry) = self.prior(&event_id) {
            return replayed_guild(&entry, user_id);
        }
        if let Some(current) = &self.snapshot(user_id)?.guild {
            return Err(FinovaError::InvalidInput(format!(
                "already a member of guild {}",
                current
            )));
        }

        self.guilds.reserve(&guild_id, user_id)?;
        let mut draft = self.draft(&scope)?;
        draft.user(user_id)?.guild = Some(guild_id.clone());

        let event = LedgerEvent::GuildJoined {
            guild_id: guild_id.clone(),
        };
        match self.commit(event_id, user_id, event, draft).await {
            Ok(AppendOutcome::Appended(_)) => {}
            Ok(AppendOutcome::Duplicate(entry)) => {
                self.guilds.release(&guild_id, user_id);
                return replayed_guild(&entry, user_id);
            }
            Err(e) => {
                self.guilds.release(&guild_id, user_id);
                return Err(e);
            }
        }

        info!(members = self.guilds.size(&guild_id), "Joined guild");
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id, event_id = %event_id))]
    pub async fn leave_guild(&self, user_id: &UserId, event_id: EventId) -> Result<()> {
        if let Some(entry) = self.prior(&event_id) {
            return replayed_guild(&entry, user_id);
        }
        let scope = self.begin(user_id, &[]).await?;
        if let Some(entry) = self.prior(&event_id) {
            return replayed_guild(&entry, user_id);
        }
        let guild_id = self
            .snapshot(user_id)?
            .guild
            .clone()
            .ok_or_else(|| FinovaError::InvalidInput("not a member of any guild".into()))?;

        let mut draft = self.draft(&scope)?;
        draft.user(user_id)?.guild = None;

        let event = LedgerEvent::GuildLeft {
            guild_id: guild_id.clone(),
        };
        if let AppendOutcome::Duplicate(entry) = self.commit(event_id, user_id, event, draft).await? {
            return replayed_guild(&entry, user_id);
        }

        info!(%guild_id, "Left guild");
        Ok(())
    }
}

fn replayed_stake(entry: &LedgerEntry<LedgerEvent>, user_id: &UserId) -> Result<StakeReceipt> {
    match &entry.event {
        LedgerEvent::StakeOpened {
            position,
            projection,
            ..
        } if &entry.user_id == user_id => Ok(StakeReceipt {
            stake_position_id: position.id,
            tier: position.tier,
            staked: position.amount,
            projected_bonus: projection.clone(),
        }),
        _ => Err(RewardEngine::reused(&entry.event_id)),
    }
}

fn replayed_unstake(entry: &LedgerEntry<LedgerEvent>, user_id: &UserId) -> Result<Unstake> {
    match &entry.event {
        LedgerEvent::StakeClosed { unstake } if &entry.user_id == user_id => Ok(unstake.clone()),
        _ => Err(RewardEngine::reused(&entry.event_id)),
    }
}

fn replayed_guild(entry: &LedgerEntry<LedgerEvent>, user_id: &UserId) -> Result<()> {
    match &entry.event {
        LedgerEvent::GuildJoined { .. } | LedgerEvent::GuildLeft { .. } if &entry.user_id == user_id => {
            Ok(())
        }
        _ => Err(RewardEngine::reused(&entry.event_id)),
    }
}

fn replayed_card(entry: &LedgerEntry<LedgerEvent>, user_id: &UserId) -> Result<CardEffect> {
    match &entry.event {
        LedgerEvent::CardActivated { card } if &entry.user_id == user_id => Ok(card.clone()),
        _ => Err(RewardEngine::reused(&entry.event_id)),
    }
}
