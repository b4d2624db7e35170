//! Ledger entries and the hash chain

use finova_common::{EventId, UserId, UserState};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Hash preceding the first entry
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Event payload stored in the ledger
pub trait LedgerPayload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> LedgerPayload for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Resulting change for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDelta {
    pub user_id: UserId,
    /// XP gained
    #[serde(default)]
    pub xp: u64,
    /// RP gained
    #[serde(default)]
    pub rp: f64,
    /// Net FIN change (mined, released, or locked as a negative)
    #[serde(default)]
    pub fin: Decimal,
    /// State after the entry was applied
    pub after: UserState,
}

impl UserDelta {
    pub fn state(after: UserState) -> Self {
        Self {
            user_id: after.user_id.clone(),
            xp: 0,
            rp: 0.0,
            fin: Decimal::ZERO,
            after,
        }
    }

    pub fn with_xp(mut self, xp: u64) -> Self {
        self.xp = xp;
        self
    }

    pub fn with_rp(mut self, rp: f64) -> Self {
        self.rp = rp;
        self
    }

    pub fn with_fin(mut self, fin: Decimal) -> Self {
        self.fin = fin;
        self
    }
}

/// Immutable ledger record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "E: LedgerPayload")]
pub struct LedgerEntry<E> {
    /// Strictly increasing, starting at 1
    pub sequence: u64,
    pub event_id: EventId,
    /// User that issued the operation
    pub user_id: UserId,
    /// Server time (Unix millis)
    pub recorded_at: i64,
    pub event: E,
    pub deltas: Vec<UserDelta>,
    pub prev_hash: String,
    pub hash: String,
}

#[derive(Serialize)]
#[serde(bound = "E: LedgerPayload")]
struct HashedBody<'a, E> {
    sequence: u64,
    event_id: &'a EventId,
    user_id: &'a UserId,
    recorded_at: i64,
    event: &'a E,
    deltas: &'a [UserDelta],
}

impl<E: LedgerPayload> LedgerEntry<E> {
    /// `blake3(prev_hash ‖ json(body))`, hex encoded
    pub fn compute_hash(&self) -> finova_common::Result<String> {
        let body = HashedBody {
            sequence: self.sequence,
            event_id: &self.event_id,
            user_id: &self.user_id,
            recorded_at: self.recorded_at,
            event: &self.event,
            deltas: &self.deltas,
        };
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.prev_hash.as_bytes());
        hasher.update(&serde_json::to_vec(&body)?);
        Ok(hasher.finalize().to_hex().to_string())
    }

    /// Users whose state this entry changed
    pub fn touches(&self, user_id: &UserId) -> bool {
        self.deltas.iter().any(|d| &d.user_id == user_id)
    }

    pub fn delta_for(&self, user_id: &UserId) -> Option<&UserDelta> {
        self.deltas.iter().find(|d| &d.user_id == user_id)
    }
}
