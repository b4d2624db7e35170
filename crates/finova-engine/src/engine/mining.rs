//! Mining session lifecycle: start, stop, lazy timeout and the sweep

use super::{Draft, MiningStarted, MiningStopped, RewardEngine, Scope, SweepReport};
use crate::events::LedgerEvent;
use crate::session::ClosedSession;
use finova_common::{
    fin_amount, CardId, CloseReason, EventId, FinovaError, Result, RpSource, SessionId, UserId,
};
use finova_ledger::{AppendOutcome, LedgerEntry};
use finova_rewards::bonus::{BonusStack, Target};
use finova_rewards::RpDelta;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

/// Everything a session close changed
struct SessionClose {
    closed: ClosedSession,
    mined: Decimal,
    consumed: Vec<CardId>,
    rp: Vec<RpDelta>,
}

impl RewardEngine {
    #[instrument(skip(self), fields(user_id = %user_id, event_id = %event_id))]
    pub async fn start_mining(&self, user_id: &UserId, event_id: EventId) -> Result<MiningStarted> {
        if let Some(entry) = self.prior(&event_id) {
            return replayed_start(&entry, user_id);
        }
        let scope = self.begin(user_id, &[]).await?;
        if let Some(entry) = self.prior(&event_id) {
            return replayed_start(&entry, user_id);
        }
        let now = scope.now;
        let current = self.snapshot(user_id)?;

        if current.has_active_session() {
            return Err(FinovaError::SessionAlreadyActive);
        }
        if self.policy.require_identity_for_mining && !current.trust.identity_verified() {
            return Err(FinovaError::IdentityVerificationRequired);
        }
        if current.trust.humanity_proof_required {
            return Err(FinovaError::HumanityProofRequired);
        }

        let rate = self.rate_for(&current, now).rate;
        let session = self.sessions.open(user_id.clone(), now, rate);
        let started = MiningStarted {
            session_id: session.id,
            started_at: session.started_at,
            rate,
        };

        let mut draft = self.draft(&scope)?;
        let state = draft.user(user_id)?;
        state.session = Some(session);
        state.last_active_at = now;

        let event = LedgerEvent::MiningStarted {
            session_id: started.session_id,
            started_at: started.started_at,
            rate,
        };
        if let AppendOutcome::Duplicate(entry) = self.commit(event_id, user_id, event, draft).await? {
            return replayed_start(&entry, user_id);
        }

        self.metrics.sessions_started.inc();
        info!(session_id = %started.session_id, rate, "Mining session started");
        Ok(started)
    }

    /// Close an active session and credit what it accrued
    ///
    /// Stopping a session that already closed returns its recorded result.
    #[instrument(skip(self))]
    pub async fn stop_mining(&self, session_id: SessionId) -> Result<MiningStopped> {
        let close_id = close_event_id(session_id)?;
        let Some(user_id) = self
            .session_index
            .get(&session_id)
            .map(|owner| owner.value().clone())
        else {
            return self.recorded_close(&close_id);
        };

        let scope = self.begin(&user_id, &[]).await?;
        if let Some(stopped) = scope.timed_out.as_ref().filter(|s| s.session_id == session_id) {
            return Ok(stopped.clone());
        }

        let current = self.snapshot(&user_id)?;
        if current.active_session().map(|s| s.id) != Some(session_id) {
            return self.recorded_close(&close_id);
        }

        let mut draft = self.draft(&scope)?;
        let close = self.close_session(&mut draft, &user_id)?;
        draft.user(&user_id)?.last_active_at = scope.now;
        self.record_close(&user_id, draft, close).await
    }

    /// Close the user's session if it ran past its timeout
    pub(super) async fn close_if_timed_out(
        &self,
        scope: &Scope,
        user_id: &UserId,
    ) -> Result<Option<MiningStopped>> {
        let current = self.snapshot(user_id)?;
        let timed_out = current
            .active_session()
            .map(|s| self.sessions.timed_out(s, scope.now))
            .unwrap_or(false);
        if !timed_out {
            return Ok(None);
        }

        let mut draft = self.draft(scope)?;
        let close = self.close_session(&mut draft, user_id)?;
        self.record_close(user_id, draft, close).await.map(Some)
    }

    fn close_session(&self, draft: &mut Draft, user_id: &UserId) -> Result<SessionClose> {
        let now = draft.now;
        let state = draft.user(user_id)?;
        let session = state
            .session
            .as_mut()
            .filter(|s| s.is_active())
            .ok_or(FinovaError::SessionNotActive)?;

        let closed = self.sessions.close(session, now);
        let mined = fin_amount(closed.total_mined);
        state.wallet.credit(mined)?;

        // Single-use mining cards are spent by the session they boosted
        let stack = BonusStack::for_user(state, &self.policy, now);
        let consumed = self.bonuses.resolve(Target::MiningRate, 1.0, &stack).consumed;
        state.cards.retain(|c| !consumed.contains(&c.card_id));

        draft.gain(user_id, 0, 0.0, mined);
        let ancestors = self.ancestors(user_id);
        let rp = self.distribute_rp(draft, &ancestors, closed.total_mined, RpSource::Mining)?;

        Ok(SessionClose {
            closed,
            mined,
            consumed,
            rp,
        })
    }

    async fn record_close(
        &self,
        user_id: &UserId,
        draft: Draft,
        close: SessionClose,
    ) -> Result<MiningStopped> {
        let SessionClose {
            closed,
            mined,
            consumed,
            rp,
        } = close;

        let stopped = MiningStopped {
            session_id: closed.session_id,
            total_mined: mined,
            duration_seconds: closed.duration_seconds,
            reason: closed.reason,
        };
        let event = LedgerEvent::MiningStopped {
            session_id: closed.session_id,
            reason: closed.reason,
            total_mined: mined,
            duration_seconds: closed.duration_seconds,
            consumed,
            rp,
        };

        // One close per session: the id makes a retried close a duplicate
        let event_id = close_event_id(closed.session_id)?;
        match self.commit(event_id, user_id, event, draft).await? {
            AppendOutcome::Appended(_) => {
                let reason = match closed.reason {
                    CloseReason::Stopped => "stopped",
                    CloseReason::Timeout => "timeout",
                };
                self.metrics.sessions_stopped.with_label_values(&[reason]).inc();
                self.metrics.fin_mined.observe(closed.total_mined);
                info!(
                    %user_id,
                    session_id = %closed.session_id,
                    total_mined = %mined,
                    duration_seconds = closed.duration_seconds,
                    reason,
                    "Mining session closed"
                );
                Ok(stopped)
            }
            AppendOutcome::Duplicate(entry) => replayed_close(&entry),
        }
    }

    fn recorded_close(&self, close_id: &EventId) -> Result<MiningStopped> {
        match self.ledger.get(close_id) {
            Some(entry) => replayed_close(&entry),
            None => Err(FinovaError::SessionNotActive),
        }
    }

    /// Close timed-out sessions, drop expired cards and pick up rate drift
    ///
    /// Runs without rate limiting; one user's failure is logged and skipped.
    pub async fn sweep(&self) -> SweepReport {
        let users: Vec<UserId> = self.slots.iter().map(|slot| slot.key().clone()).collect();
        let mut report = SweepReport::default();

        for user_id in users {
            if !self.needs_sweep(&user_id) {
                continue;
            }
            match self.sweep_user(&user_id).await {
                Ok((closed, refreshed)) => {
                    report.sessions_closed += closed as usize;
                    report.users_refreshed += refreshed as usize;
                }
                Err(e) => warn!(%user_id, error = %e, "Sweep skipped user"),
            }
        }

        if report != SweepReport::default() {
            info!(
                sessions_closed = report.sessions_closed,
                users_refreshed = report.users_refreshed,
                "Sweep complete"
            );
        }
        report
    }

    fn needs_sweep(&self, user_id: &UserId) -> bool {
        let Ok(state) = self.snapshot(user_id) else {
            return false;
        };
        let now = self.clock.now_ms();
        if state.cards.iter().any(|c| c.is_expired(now)) {
            return true;
        }
        match state.active_session() {
            Some(session) => {
                self.sessions.timed_out(session, now)
                    || (self.rate_for(&state, now).rate - session.current_rate()).abs() > f64::EPSILON
            }
            None => false,
        }
    }

    async fn sweep_user(&self, user_id: &UserId) -> Result<(bool, bool)> {
        let scope = self.begin_maintenance(user_id).await?;
        let closed = self.close_if_timed_out(&scope, user_id).await?.is_some();

        let current = self.snapshot(user_id)?;
        let now = scope.now;
        let expired: Vec<CardId> = current
            .cards
            .iter()
            .filter(|c| c.is_expired(now))
            .map(|c| c.card_id)
            .collect();

        let mut draft = self.draft(&scope)?;
        let state = draft.user(user_id)?;
        state.cards.retain(|c| !c.is_expired(now));
        let session_id = state.active_session().map(|s| s.id);
        let rate_changed = self.refresh_session_rate(state, now);

        let event = match (expired.is_empty(), session_id) {
            (false, _) => LedgerEvent::CardsExpired { card_ids: expired },
            (true, Some(session_id)) if rate_changed => LedgerEvent::RateCheckpoint {
                session_id,
                at: now,
                rate: self.rate_for(state, now).rate,
            },
            _ => return Ok((closed, false)),
        };

        self.commit(EventId::generate("sweep"), user_id, event, draft)
            .await?;
        Ok((closed, true))
    }
}

fn close_event_id(session_id: SessionId) -> Result<EventId> {
    EventId::new(format!("session-close-{}", session_id))
}

fn replayed_start(entry: &LedgerEntry<LedgerEvent>, user_id: &UserId) -> Result<MiningStarted> {
    match &entry.event {
        LedgerEvent::MiningStarted {
            session_id,
            started_at,
            rate,
        } if &entry.user_id == user_id => Ok(MiningStarted {
            session_id: *session_id,
            started_at: *started_at,
            rate: *rate,
        }),
        _ => Err(RewardEngine::reused(&entry.event_id)),
    }
}

fn replayed_close(entry: &LedgerEntry<LedgerEvent>) -> Result<MiningStopped> {
    match &entry.event {
        LedgerEvent::MiningStopped {
            session_id,
            reason,
            total_mined,
            duration_seconds,
            ..
        } => Ok(MiningStopped {
            session_id: *session_id,
            total_mined: *total_mined,
            duration_seconds: *duration_seconds,
            reason: *reason,
        }),
        _ => Err(FinovaError::Internal(format!(
            "{} is recorded as {}",
            entry.event_id,
            entry.event.name()
        ))),
    }
}
