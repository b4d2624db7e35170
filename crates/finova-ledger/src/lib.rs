//! # Finova Ledger
//!
//! Append-only, deduplicated record of every reward-affecting event. The
//! ledger is the source of truth; user projections are rebuilt from it.
//!
//! ```text
//! append(event_id, event, deltas)
//!        │
//!        ├── known event id ──► Duplicate(prior entry)
//!        │
//!        ▼
//!   seq = head + 1, hash = blake3(prev_hash ‖ body)
//!        │
//!        ▼
//!   LedgerStore::append ── error ──► StorageUnavailable (head unchanged)
//!        │
//!        ▼
//!   Appended(entry)
//! ```

pub mod entry;
pub mod ledger;
pub mod store;

pub use entry::{LedgerEntry, LedgerPayload, UserDelta, GENESIS_HASH};
pub use ledger::{AppendOutcome, EventLedger, LedgerStats};
pub use store::{FileStore, LedgerStore, MemoryStore};
