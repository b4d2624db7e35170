//! Reward engine facade
//!
//! ```text
//!   write op ──► rate limit ──► lock user + ancestors (ascending UserId)
//!                                   │
//!                                   ▼
//!                  close timed-out session (own ledger entry)
//!                                   │
//!                                   ▼
//!                  Draft: mutate clones of the locked states
//!                                   │
//!                                   ▼
//!                  finalize: prune expired cards, checkpoint rates
//!                                   │
//!                                   ▼
//!                  ledger append ── error ──► nothing published
//!                                   │
//!                                   ▼
//!                  publish snapshots, reindex, bump NetworkSnapshot
//! ```
//!
//! Each user owns a writer gate and a committed `Arc<UserState>`. Readers
//! clone the `Arc` and never wait on writers. The ledger is the source of
//! truth: `RewardEngine::new` replays every entry's resulting states.

mod activity;
mod holdings;
mod mining;
mod referral;
mod trust;
pub mod types;

pub use types::{
    ActivityOutcome, MiningRate, MiningStarted, MiningStopped, NetworkSnapshot, ReferralApplied,
    SessionView, StakeReceipt, SweepReport, UserProfile,
};

use crate::config::EngineSettings;
use crate::events::LedgerEvent;
use crate::guild::GuildRegistry;
use crate::metrics::EngineMetrics;
use crate::rate_limit::RateLimiter;
use crate::session::SessionManager;
use dashmap::DashMap;
use finova_common::{
    fin_to_f64, Clock, EventId, FinovaError, Result, RewardPolicy, RpSource, SessionId, UserId,
    UserState,
};
use finova_ledger::{AppendOutcome, EventLedger, LedgerEntry, UserDelta};
use finova_rewards::bonus::{BonusResolver, BonusStack, Target};
use finova_rewards::referral::{self as rewards_referral, NetworkStats, ReferralForest, RpDelta};
use finova_rewards::{RateCalculator, RateInputs, XpEngine};
use finova_trust::TrustScorer;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{btree_map::Entry, BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

struct UserSlot {
    /// Held for the whole read-compute-commit cycle of a write
    gate: Arc<Mutex<()>>,
    state: RwLock<Arc<UserState>>,
}

impl UserSlot {
    fn new(state: Arc<UserState>) -> Self {
        Self {
            gate: Arc::new(Mutex::new(())),
            state: RwLock::new(state),
        }
    }

    fn snapshot(&self) -> Arc<UserState> {
        self.state.read().clone()
    }
}

/// Gates held by one write operation
pub(crate) struct Scope {
    pub now: i64,
    pub users: BTreeSet<UserId>,
    /// Set when entering the scope closed a timed-out session
    pub timed_out: Option<MiningStopped>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

#[derive(Default)]
struct Gains {
    xp: u64,
    rp: f64,
    fin: Decimal,
}

/// Working copies of the locked users' states for one write
pub(crate) struct Draft {
    now: i64,
    base: BTreeMap<UserId, Arc<UserState>>,
    states: BTreeMap<UserId, UserState>,
    gains: BTreeMap<UserId, Gains>,
}

impl Draft {
    fn new(now: i64, base: BTreeMap<UserId, Arc<UserState>>) -> Self {
        Self {
            now,
            base,
            states: BTreeMap::new(),
            gains: BTreeMap::new(),
        }
    }

    /// Mutable working copy; only locked users can be changed
    fn user(&mut self, user_id: &UserId) -> Result<&mut UserState> {
        match self.states.entry(user_id.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let base = self.base.get(user_id).ok_or_else(|| {
                    FinovaError::Internal(format!("user {} is not locked by this write", user_id))
                })?;
                Ok(entry.insert(UserState::clone(base)))
            }
        }
    }

    fn gain(&mut self, user_id: &UserId, xp: u64, rp: f64, fin: Decimal) {
        let gains = self.gains.entry(user_id.clone()).or_default();
        gains.xp = gains.xp.saturating_add(xp);
        gains.rp += rp;
        gains.fin += fin;
    }
}

pub struct RewardEngine {
    policy: RewardPolicy,
    clock: Arc<dyn Clock>,
    ledger: Arc<EventLedger<LedgerEvent>>,
    xp: XpEngine,
    trust: TrustScorer,
    rates: RateCalculator,
    bonuses: BonusResolver,
    sessions: SessionManager,
    limiter: RateLimiter,
    metrics: Arc<EngineMetrics>,
    slots: DashMap<UserId, Arc<UserSlot>>,
    /// Active session -> owner
    session_index: DashMap<SessionId, UserId>,
    /// Referral code -> owner
    codes: DashMap<String, UserId>,
    forest: RwLock<ReferralForest>,
    guilds: GuildRegistry,
    network: RwLock<Arc<NetworkSnapshot>>,
    /// Serializes registrations and referral edge creation
    link_gate: Mutex<()>,
}

impl RewardEngine {
    /// Build the engine over `ledger`, replaying every recorded entry
    pub fn new(
        settings: EngineSettings,
        clock: Arc<dyn Clock>,
        ledger: Arc<EventLedger<LedgerEvent>>,
    ) -> Result<Self> {
        let policy = settings.policy;
        policy.validate()?;

        let engine = Self {
            xp: XpEngine::new(policy.xp.clone()),
            trust: TrustScorer::new(policy.trust.clone()),
            rates: RateCalculator::new(policy.rate.clone(), policy.trust.humanity_floor),
            bonuses: BonusResolver::new(policy.bonus.global_cap),
            sessions: SessionManager::new(policy.session.timeout_secs),
            limiter: RateLimiter::new(&settings.rate_limit),
            metrics: Arc::new(EngineMetrics::new()?),
            guilds: GuildRegistry::new(policy.bonus.max_guild_size),
            slots: DashMap::new(),
            session_index: DashMap::new(),
            codes: DashMap::new(),
            forest: RwLock::new(ReferralForest::new()),
            network: RwLock::new(Arc::new(NetworkSnapshot::default())),
            link_gate: Mutex::new(()),
            policy,
            clock,
            ledger,
        };

        let entries = engine.ledger.entries();
        for entry in &entries {
            for delta in &entry.deltas {
                engine.publish(delta.after.clone());
            }
        }

        let network = engine.network_snapshot();
        info!(
            entries = entries.len(),
            users = network.total_users,
            active_sessions = network.active_sessions,
            policy_version = engine.policy.version,
            "Reward engine restored from ledger"
        );
        Ok(engine)
    }

    pub fn policy(&self) -> &RewardPolicy {
        &self.policy
    }

    pub fn ledger(&self) -> &Arc<EventLedger<LedgerEvent>> {
        &self.ledger
    }

    pub fn metrics(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    pub fn network_snapshot(&self) -> Arc<NetworkSnapshot> {
        self.network.read().clone()
    }

    /// Committed state of a user
    pub fn snapshot(&self, user_id: &UserId) -> Result<Arc<UserState>> {
        Ok(self.slot(user_id)?.snapshot())
    }

    pub fn referral_code(&self, user_id: &UserId) -> Result<String> {
        Ok(self.snapshot(user_id)?.referral_code.clone())
    }

    pub fn user_profile(&self, user_id: &UserId) -> Result<UserProfile> {
        let state = self.snapshot(user_id)?;
        Ok(self.profile(&state, self.clock.now_ms()))
    }

    /// Effective mining rate of a user right now
    pub fn get_mining_rate(&self, user_id: &UserId) -> Result<MiningRate> {
        let state = self.snapshot(user_id)?;
        self.metrics.rate_queries.inc();
        Ok(self.rate_for(&state, self.clock.now_ms()))
    }

    fn slot(&self, user_id: &UserId) -> Result<Arc<UserSlot>> {
        self.slots
            .get(user_id)
            .map(|slot| Arc::clone(slot.value()))
            .ok_or(FinovaError::Unauthorized)
    }

    // ============ Locking ============

    /// `user`, `extra` and every ancestor whose RP a write may touch
    fn chain_for(&self, user_id: &UserId, extra: &[UserId]) -> BTreeSet<UserId> {
        let forest = self.forest.read();
        let mut users = BTreeSet::new();
        for id in std::iter::once(user_id).chain(extra) {
            users.insert(id.clone());
            users.extend(forest.ancestors(id, self.policy.referral.max_depth));
        }
        users
    }

    async fn lock_users(&self, users: &BTreeSet<UserId>) -> Result<Vec<OwnedMutexGuard<()>>> {
        let mut guards = Vec::with_capacity(users.len());
        // BTreeSet iteration is ascending, which fixes the global lock order
        for user_id in users {
            let slot = self.slot(user_id)?;
            guards.push(slot.gate.clone().lock_owned().await);
        }
        Ok(guards)
    }

    /// Lock the chain, retrying if the ancestry changed while waiting
    async fn lock_chain(
        &self,
        user_id: &UserId,
        extra: &[UserId],
    ) -> Result<(BTreeSet<UserId>, Vec<OwnedMutexGuard<()>>)> {
        loop {
            let wanted = self.chain_for(user_id, extra);
            let guards = self.lock_users(&wanted).await?;
            if self.chain_for(user_id, extra) == wanted {
                return Ok((wanted, guards));
            }
            drop(guards);
            debug!(%user_id, "Ancestry changed while locking, retrying");
        }
    }

    /// Enter a write on behalf of `user_id`
    async fn begin(&self, user_id: &UserId, extra: &[UserId]) -> Result<Scope> {
        self.slot(user_id)?;
        for id in extra {
            self.slot(id)?;
        }

        if let Err(e) = self.limiter.check(user_id, self.clock.now_ms()) {
            self.metrics.rate_limited.inc();
            return Err(e);
        }

        let (users, guards) = self.lock_chain(user_id, extra).await?;
        let mut scope = Scope {
            now: self.clock.now_ms(),
            users,
            timed_out: None,
            _guards: guards,
        };
        scope.timed_out = self.close_if_timed_out(&scope, user_id).await?;
        Ok(scope)
    }

    /// Lock without rate limiting, for engine-initiated maintenance
    async fn begin_maintenance(&self, user_id: &UserId) -> Result<Scope> {
        let (users, guards) = self.lock_chain(user_id, &[]).await?;
        Ok(Scope {
            now: self.clock.now_ms(),
            users,
            timed_out: None,
            _guards: guards,
        })
    }

    fn draft(&self, scope: &Scope) -> Result<Draft> {
        let mut base = BTreeMap::new();
        for user_id in &scope.users {
            base.insert(user_id.clone(), self.snapshot(user_id)?);
        }
        Ok(Draft::new(scope.now, base))
    }

    // ============ Commit ============

    /// Turn the draft into ledger deltas
    ///
    /// Expired cards are dropped and active sessions pick up the rate the new
    /// state implies. Users whose state did not change produce no delta.
    fn finalize(&self, draft: Draft) -> Vec<UserDelta> {
        let Draft {
            now,
            base,
            states,
            mut gains,
        } = draft;

        let mut deltas = Vec::with_capacity(states.len());
        for (user_id, mut state) in states {
            state.cards.retain(|card| !card.is_expired(now));
            self.refresh_session_rate(&mut state, now);

            let Some(before) = base.get(&user_id) else {
                continue;
            };
            if state == **before {
                continue;
            }
            state.version = before.version + 1;

            let gains = gains.remove(&user_id).unwrap_or_default();
            deltas.push(
                UserDelta::state(state)
                    .with_xp(gains.xp)
                    .with_rp(gains.rp)
                    .with_fin(gains.fin),
            );
        }
        deltas
    }

    /// Checkpoint the active session if the state implies a different rate
    fn refresh_session_rate(&self, state: &mut UserState, now: i64) -> bool {
        let Some(current) = state.active_session().map(|s| s.current_rate()) else {
            return false;
        };
        let rate = self.rate_for(state, now).rate;
        if (rate - current).abs() <= f64::EPSILON {
            return false;
        }
        match state.session.as_mut() {
            Some(session) => self.sessions.checkpoint(session, now, rate),
            None => false,
        }
    }

    async fn commit(
        &self,
        event_id: EventId,
        user_id: &UserId,
        event: LedgerEvent,
        draft: Draft,
    ) -> Result<AppendOutcome<LedgerEvent>> {
        let now = draft.now;
        let deltas = self.finalize(draft);
        self.append(event_id, user_id, now, event, deltas).await
    }

    async fn append(
        &self,
        event_id: EventId,
        user_id: &UserId,
        now: i64,
        event: LedgerEvent,
        deltas: Vec<UserDelta>,
    ) -> Result<AppendOutcome<LedgerEvent>> {
        let name = event.name();
        let outcome = self
            .ledger
            .append(event_id, user_id.clone(), now, event, deltas)
            .await
            .map_err(|e| {
                self.metrics.ledger_append_failures.inc();
                warn!(%user_id, event = name, error = %e, "Write not committed");
                e
            })?;

        match &outcome {
            AppendOutcome::Appended(entry) => {
                for delta in &entry.deltas {
                    self.publish(delta.after.clone());
                }
                debug!(%user_id, event = name, sequence = entry.sequence, "Committed");
            }
            AppendOutcome::Duplicate(entry) => {
                self.metrics.duplicate_events.inc();
                debug!(%user_id, event = name, sequence = entry.sequence, "Duplicate event id");
            }
        }
        Ok(outcome)
    }

    /// Entry already recorded for a caller event id
    fn prior(&self, event_id: &EventId) -> Option<Arc<LedgerEntry<LedgerEvent>>> {
        let entry = self.ledger.get(event_id)?;
        self.metrics.duplicate_events.inc();
        Some(entry)
    }

    fn reused(event_id: &EventId) -> FinovaError {
        FinovaError::InvalidInput(format!(
            "event id {} was already used for a different operation",
            event_id
        ))
    }

    /// Replace the committed snapshot and keep the indexes in step
    fn publish(&self, state: UserState) {
        let state = Arc::new(state);
        let existing = self.slots.get(&state.user_id).map(|slot| Arc::clone(slot.value()));
        let previous = match existing {
            Some(slot) => Some(std::mem::replace(&mut *slot.state.write(), state.clone())),
            None => {
                self.slots
                    .insert(state.user_id.clone(), Arc::new(UserSlot::new(state.clone())));
                None
            }
        };
        self.reindex(previous.as_deref(), &state);
    }

    fn reindex(&self, previous: Option<&UserState>, current: &UserState) {
        let user_id = &current.user_id;
        let mut new_users = 0u64;

        if previous.is_none() {
            self.codes.insert(current.referral_code.clone(), user_id.clone());
            self.forest.write().add_node(user_id.clone());
            new_users = 1;
        }

        if let Some(referrer) = &current.referrer {
            let mut forest = self.forest.write();
            if forest.parent(user_id).is_none() {
                if let Err(e) = forest.add_edge(referrer, user_id) {
                    warn!(%user_id, %referrer, error = %e, "Referral edge not indexed");
                }
            }
        }

        let before = previous.and_then(|p| p.active_session()).map(|s| s.id);
        let after = current.active_session().map(|s| s.id);
        let mut opened = 0u64;
        let mut closed = 0u64;
        if before != after {
            if let Some(id) = before {
                self.session_index.remove(&id);
                closed = 1;
            }
            if let Some(id) = after {
                self.session_index.insert(id, user_id.clone());
                opened = 1;
            }
        }

        let old_guild = previous.and_then(|p| p.guild.as_ref());
        if old_guild != current.guild.as_ref() {
            if let Some(guild_id) = old_guild {
                self.guilds.release(guild_id, user_id);
            }
            if let Some(guild_id) = &current.guild {
                self.guilds.insert(guild_id, user_id);
            }
        }

        let mut network = self.network.write();
        let next = NetworkSnapshot {
            version: network.version + 1,
            total_users: network.total_users + new_users,
            active_sessions: (network.active_sessions + opened).saturating_sub(closed),
        };
        self.metrics.active_sessions.set(next.active_sessions as i64);
        *network = Arc::new(next);
    }

    // ============ Shared computations ============

    fn ancestors(&self, user_id: &UserId) -> Vec<UserId> {
        self.forest.read().ancestors(user_id, self.policy.referral.max_depth)
    }

    /// Direct referees active inside the dormancy window
    fn active_referees(&self, user_id: &UserId, now: i64) -> u32 {
        let children = self.forest.read().children(user_id).to_vec();
        let window = self.policy.referral.dormancy_ms();
        children
            .iter()
            .filter_map(|child| self.snapshot(child).ok())
            .filter(|child| child.is_active_within(now, window))
            .count() as u32
    }

    fn network_stats(&self, user_id: &UserId, now: i64) -> NetworkStats {
        let (direct, size) = {
            let forest = self.forest.read();
            (
                forest.children(user_id).len() as u32,
                forest.network_size(user_id, self.policy.referral.max_depth),
            )
        };
        NetworkStats {
            direct,
            active: self.active_referees(user_id, now),
            size,
        }
    }

    fn rate_for(&self, state: &UserState, now: i64) -> MiningRate {
        let network = self.network_snapshot();
        let stats = self.network_stats(&state.user_id, now);
        let referral_policy = &self.policy.referral;

        let breakdown = self.rates.effective_rate(&RateInputs {
            total_users: network.total_users,
            referral_bonus: rewards_referral::referral_bonus(referral_policy, state.rp, &stats),
            trust_score: state.trust.score,
            humanity_proof_required: state.trust.humanity_proof_required,
            holdings: fin_to_f64(state.wallet.total()),
            level: state.xp.level,
        });

        let stack = BonusStack::for_user(state, &self.policy, now);
        let bonuses = self.bonuses.resolve(Target::MiningRate, breakdown.rate, &stack);

        // Cards may push past the ceiling; the ceiling wins
        let rate = self.rates.clamp(bonuses.final_value);
        MiningRate {
            user_id: state.user_id.clone(),
            rate,
            clamped: rate < bonuses.final_value,
            rp_tier: rewards_referral::tier_for(referral_policy, state.rp, stats.active),
            network: stats,
            breakdown,
            bonuses,
            computed_at: now,
        }
    }

    /// Credit RP up the referral chain
    ///
    /// Each ancestor's share passes through its own ReferralPoints bonus
    /// stack before it is added.
    fn distribute_rp(
        &self,
        draft: &mut Draft,
        ancestors: &[UserId],
        amount: f64,
        source: RpSource,
    ) -> Result<Vec<RpDelta>> {
        let now = draft.now;
        let mut credited = Vec::new();
        for delta in rewards_referral::propagate(&self.policy.referral, ancestors, amount, source) {
            let ancestor = draft.user(&delta.ancestor)?;
            let stack = BonusStack::for_user(ancestor, &self.policy, now);
            let resolution = self.bonuses.resolve(Target::ReferralPoints, delta.points, &stack);
            ancestor.rp += resolution.final_value;
            if !resolution.consumed.is_empty() {
                ancestor.cards.retain(|c| !resolution.consumed.contains(&c.card_id));
            }
            draft.gain(&delta.ancestor, 0, resolution.final_value, Decimal::ZERO);
            credited.push(RpDelta {
                points: resolution.final_value,
                ..delta
            });
        }
        Ok(credited)
    }

    fn profile(&self, state: &UserState, now: i64) -> UserProfile {
        let active_referees = self.active_referees(&state.user_id, now);
        let session = state.session.as_ref().map(|s| SessionView {
            session_id: s.id,
            started_at: s.started_at,
            expires_at: s.expires_at,
            active: s.is_active(),
            accrued: self.sessions.accrued_at(s, now),
            rate: if s.is_active() { s.current_rate() } else { 0.0 },
            checkpoints: s.checkpoints.len(),
        });

        UserProfile {
            user_id: state.user_id.clone(),
            total_xp: state.xp.total_xp,
            level: state.xp.level,
            current_streak: state.xp.current_streak,
            rp: state.rp,
            rp_tier: rewards_referral::tier_for(&self.policy.referral, state.rp, active_referees),
            active_referees,
            trust_score: state.trust.score,
            humanity_proof_required: state.trust.humanity_proof_required,
            identity_verified: state.trust.identity_verified(),
            available: state.wallet.available,
            staked: state.wallet.staked,
            stake: state.stake.clone(),
            session,
            cards: state.cards.iter().filter(|c| !c.is_expired(now)).cloned().collect(),
            guild: state.guild.clone(),
            referrer: state.referrer.clone(),
            referral_code: state.referral_code.clone(),
            version: state.version,
        }
    }
}
