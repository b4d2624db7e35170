//! Mining session manager
//!
//! ```text
//!   Idle ──start──▶ Active ──stop────▶ Idle
//!                     │
//!                     └────timeout───▶ Idle
//! ```
//!
//! Accrual is integrated piecewise over rate checkpoints. Whenever the rate
//! changes the session first accrues up to `now` at the old rate, then the new
//! rate is recorded. Accrual never runs past `expires_at`.

use finova_common::{
    CloseReason, MiningSession, RateCheckpoint, SessionId, SessionStatus, UserId,
};
use tracing::debug;

/// Rates closer than this are treated as unchanged
const RATE_EPSILON: f64 = 1e-12;

/// Outcome of closing a session
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedSession {
    pub session_id: SessionId,
    pub reason: CloseReason,
    /// FIN accrued over the whole session
    pub total_mined: f64,
    pub duration_seconds: u64,
}

#[derive(Debug, Clone)]
pub struct SessionManager {
    timeout_ms: i64,
}

impl SessionManager {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout_ms: (timeout_secs as i64).saturating_mul(1_000),
        }
    }

    /// Open a session at `now` mining at `rate`
    pub fn open(&self, user_id: UserId, now: i64, rate: f64) -> MiningSession {
        MiningSession {
            id: SessionId::generate(),
            user_id,
            started_at: now,
            last_accrual_at: now,
            accumulated: 0.0,
            status: SessionStatus::Active,
            checkpoints: vec![RateCheckpoint { at: now, rate: sanitize(rate) }],
            expires_at: now.saturating_add(self.timeout_ms),
        }
    }

    /// Integrate the current rate from the last accrual up to `now`
    pub fn accrue(&self, session: &mut MiningSession, now: i64) {
        if !session.is_active() {
            return;
        }
        let until = now.min(session.expires_at);
        if until <= session.last_accrual_at {
            return;
        }
        let elapsed_secs = (until - session.last_accrual_at) as f64 / 1_000.0;
        let earned = session.current_rate() * elapsed_secs;
        if earned.is_finite() && earned > 0.0 {
            session.accumulated += earned;
        }
        session.last_accrual_at = until;
    }

    /// Record a rate change at `now`
    ///
    /// Returns false when nothing changed: the session is closed or expired,
    /// or the rate is the one already in force.
    pub fn checkpoint(&self, session: &mut MiningSession, now: i64, rate: f64) -> bool {
        let rate = sanitize(rate);
        if !session.is_active() || session.is_expired(now) {
            return false;
        }
        if (session.current_rate() - rate).abs() <= RATE_EPSILON {
            return false;
        }

        self.accrue(session, now);
        session.checkpoints.push(RateCheckpoint { at: now, rate });
        debug!(session_id = %session.id, rate, "Rate checkpoint recorded");
        true
    }

    /// Close the session; accrued amount is final
    pub fn close(&self, session: &mut MiningSession, now: i64) -> ClosedSession {
        let reason = if session.is_expired(now) {
            CloseReason::Timeout
        } else {
            CloseReason::Stopped
        };
        self.accrue(session, now);
        session.status = SessionStatus::Closed;

        let ended_at = now.min(session.expires_at).max(session.started_at);
        ClosedSession {
            session_id: session.id,
            reason,
            total_mined: session.accumulated,
            duration_seconds: ((ended_at - session.started_at) / 1_000) as u64,
        }
    }

    /// Amount accrued as of `now` without mutating the session
    pub fn accrued_at(&self, session: &MiningSession, now: i64) -> f64 {
        let mut view = session.clone();
        self.accrue(&mut view, now);
        view.accumulated
    }

    /// Whether an active session has run past its timeout
    pub fn timed_out(&self, session: &MiningSession, now: i64) -> bool {
        session.is_active() && session.is_expired(now)
    }
}

fn sanitize(rate: f64) -> f64 {
    if rate.is_finite() && rate > 0.0 {
        rate
    } else {
        0.0
    }
}
