//! Ledger storage backends
//!
//! A store only has to durably append and reload entries in order; chain
//! verification and deduplication live in [`crate::EventLedger`].

use crate::entry::{LedgerEntry, LedgerPayload};
use async_trait::async_trait;
use finova_common::{FinovaError, Result};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Trait for ledger storage backends
#[async_trait]
pub trait LedgerStore<E: LedgerPayload>: Send + Sync {
    /// Durably record one entry. On error nothing may have been recorded.
    async fn append(&self, entry: &LedgerEntry<E>) -> Result<()>;

    /// All entries in sequence order
    async fn load(&self) -> Result<Vec<LedgerEntry<E>>>;
}

/// In-memory store
pub struct MemoryStore<E> {
    entries: RwLock<Vec<LedgerEntry<E>>>,
    /// Remaining appends that should fail
    failures: AtomicU32,
}

impl<E> MemoryStore<E> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            failures: AtomicU32::new(0),
        }
    }

    /// Make the next `n` appends fail with `StorageUnavailable`
    pub fn fail_next_appends(&self, n: u32) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<E> Default for MemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: LedgerPayload> LedgerStore<E> for MemoryStore<E> {
    async fn append(&self, entry: &LedgerEntry<E>) -> Result<()> {
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(FinovaError::StorageUnavailable(
                "memory store append failed".to_string(),
            ));
        }
        self.entries.write().push(entry.clone());
        Ok(())
    }

    async fn load(&self) -> Result<Vec<LedgerEntry<E>>> {
        Ok(self.entries.read().clone())
    }
}

/// Durable JSON-lines store; one entry per line, synced on every append
pub struct FileStore {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl FileStore {
    /// Open (or create) the ledger file
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        info!(path = %path.display(), "Opened ledger file");

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<E: LedgerPayload> LedgerStore<E> for FileStore {
    async fn append(&self, entry: &LedgerEntry<E>) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await?;
        file.flush().await?;
        file.sync_data().await?;

        debug!(sequence = entry.sequence, "Entry written to ledger file");
        Ok(())
    }

    async fn load(&self) -> Result<Vec<LedgerEntry<E>>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line).map_err(|e| {
                    FinovaError::StorageUnavailable(format!(
                        "corrupt ledger line {}: {}",
                        i + 1,
                        e
                    ))
                })
            })
            .collect()
    }
}
