//! Mining session record
//!
//! The record is plain data; accrual and state transitions live with the
//! session manager in the engine.

use super::ids::{SessionId, UserId};
use serde::{Deserialize, Serialize};

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Closed,
}

/// Why a session was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Stopped,
    Timeout,
}

/// Rate in force from `at` until the next checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateCheckpoint {
    /// Server time (Unix millis)
    pub at: i64,
    /// FIN per second
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningSession {
    pub id: SessionId,
    pub user_id: UserId,
    pub started_at: i64,
    /// Accrual has been integrated up to this instant
    pub last_accrual_at: i64,
    /// FIN accrued so far; never decreases
    pub accumulated: f64,
    pub status: SessionStatus,
    /// Rate history, first entry at `started_at`
    pub checkpoints: Vec<RateCheckpoint>,
    /// Accrual stops here (timeout)
    pub expires_at: i64,
}

impl MiningSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Rate currently in force
    pub fn current_rate(&self) -> f64 {
        self.checkpoints.last().map(|c| c.rate).unwrap_or(0.0)
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}
