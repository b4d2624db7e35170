//! Event ledger
//!
//! Append-only record of every reward-affecting event:
//! - Deduplication by event id (a replayed id returns the prior entry)
//! - Strictly increasing sequence numbers
//! - blake3 hash chain over all entries for audit
//! - Sequence is only advanced after the store durably recorded the entry

use crate::entry::{LedgerEntry, LedgerPayload, UserDelta, GENESIS_HASH};
use crate::store::LedgerStore;
use dashmap::DashMap;
use finova_common::{EventId, FinovaError, Result, UserId};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

/// Result of an append
#[derive(Debug, Clone)]
pub enum AppendOutcome<E> {
    /// New entry recorded
    Appended(Arc<LedgerEntry<E>>),
    /// Event id already recorded; the prior entry is returned untouched
    Duplicate(Arc<LedgerEntry<E>>),
}

impl<E> AppendOutcome<E> {
    pub fn entry(&self) -> &Arc<LedgerEntry<E>> {
        match self {
            AppendOutcome::Appended(entry) | AppendOutcome::Duplicate(entry) => entry,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, AppendOutcome::Duplicate(_))
    }
}

struct ChainHead {
    sequence: u64,
    hash: String,
}

/// Ledger statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerStats {
    pub entries: u64,
    pub head_hash: String,
}

pub struct EventLedger<E: LedgerPayload> {
    store: Arc<dyn LedgerStore<E>>,
    /// Serializes appends so sequence and hash chain stay consistent
    head: Mutex<ChainHead>,
    /// event id -> position in `entries`
    index: DashMap<EventId, usize>,
    entries: RwLock<Vec<Arc<LedgerEntry<E>>>>,
}

impl<E: LedgerPayload> EventLedger<E> {
    /// Open a ledger over a store, reloading and verifying existing entries
    #[instrument(skip(store))]
    pub async fn open(store: Arc<dyn LedgerStore<E>>) -> Result<Self> {
        let loaded = store.load().await?;
        verify(loaded.iter())?;

        let index = DashMap::new();
        let mut entries = Vec::with_capacity(loaded.len());
        for (pos, entry) in loaded.into_iter().enumerate() {
            index.insert(entry.event_id.clone(), pos);
            entries.push(Arc::new(entry));
        }

        let head = entries
            .last()
            .map(|e| ChainHead {
                sequence: e.sequence,
                hash: e.hash.clone(),
            })
            .unwrap_or_else(|| ChainHead {
                sequence: 0,
                hash: GENESIS_HASH.to_string(),
            });

        info!(entries = entries.len(), "Event ledger opened");

        Ok(Self {
            store,
            head: Mutex::new(head),
            index,
            entries: RwLock::new(entries),
        })
    }

    /// Append an event, or return the prior entry for a known event id
    #[instrument(skip(self, event, deltas))]
    pub async fn append(
        &self,
        event_id: EventId,
        user_id: UserId,
        recorded_at: i64,
        event: E,
        deltas: Vec<UserDelta>,
    ) -> Result<AppendOutcome<E>> {
        let mut head = self.head.lock().await;

        if let Some(prior) = self.get(&event_id) {
            return Ok(AppendOutcome::Duplicate(prior));
        }

        let mut entry = LedgerEntry {
            sequence: head.sequence + 1,
            event_id,
            user_id,
            recorded_at,
            event,
            deltas,
            prev_hash: head.hash.clone(),
            hash: String::new(),
        };
        entry.hash = entry.compute_hash()?;

        if let Err(e) = self.store.append(&entry).await {
            warn!(sequence = entry.sequence, error = %e, "Ledger append failed");
            return Err(match e {
                unavailable @ FinovaError::StorageUnavailable(_) => unavailable,
                other => FinovaError::StorageUnavailable(other.to_string()),
            });
        }

        head.sequence = entry.sequence;
        head.hash = entry.hash.clone();

        let entry = Arc::new(entry);
        let mut entries = self.entries.write();
        self.index.insert(entry.event_id.clone(), entries.len());
        entries.push(entry.clone());

        Ok(AppendOutcome::Appended(entry))
    }

    /// Entry recorded for an event id
    pub fn get(&self, event_id: &EventId) -> Option<Arc<LedgerEntry<E>>> {
        let pos = *self.index.get(event_id)?;
        self.entries.read().get(pos).cloned()
    }

    pub fn contains(&self, event_id: &EventId) -> bool {
        self.index.contains_key(event_id)
    }

    /// All entries in sequence order
    pub fn entries(&self) -> Vec<Arc<LedgerEntry<E>>> {
        self.entries.read().clone()
    }

    /// Entries that changed a user's state, in sequence order
    pub fn entries_for(&self, user_id: &UserId) -> Vec<Arc<LedgerEntry<E>>> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.touches(user_id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn stats(&self) -> LedgerStats {
        let entries = self.entries.read();
        LedgerStats {
            entries: entries.len() as u64,
            head_hash: entries
                .last()
                .map(|e| e.hash.clone())
                .unwrap_or_else(|| GENESIS_HASH.to_string()),
        }
    }

    /// Re-verify sequence numbers and the hash chain
    pub fn verify_chain(&self) -> Result<()> {
        let entries = self.entries.read();
        verify(entries.iter().map(|e| e.as_ref()))
    }
}

fn verify<'a, E: LedgerPayload>(entries: impl Iterator<Item = &'a LedgerEntry<E>>) -> Result<()> {
    let mut prev_hash = GENESIS_HASH.to_string();
    for (i, entry) in entries.enumerate() {
        check_link(i, entry, &prev_hash)?;
        prev_hash = entry.hash.clone();
    }
    Ok(())
}

fn check_link<E: LedgerPayload>(pos: usize, entry: &LedgerEntry<E>, prev_hash: &str) -> Result<()> {
    let expected_sequence = pos as u64 + 1;
    if entry.sequence != expected_sequence {
        return Err(FinovaError::Internal(format!(
            "ledger sequence gap: expected {}, found {}",
            expected_sequence, entry.sequence
        )));
    }
    if entry.prev_hash != prev_hash {
        return Err(FinovaError::Internal(format!(
            "ledger chain broken at sequence {}",
            entry.sequence
        )));
    }
    if entry.compute_hash()? != entry.hash {
        return Err(FinovaError::Internal(format!(
            "ledger entry {} hash mismatch",
            entry.sequence
        )));
    }
    Ok(())
}
