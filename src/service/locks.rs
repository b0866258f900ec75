//! Per-partition write serialization
//!
//! Every read-compute-write of a partition's counters runs while holding that
//! deck size's lock. Different deck sizes proceed in parallel. Partition locks
//! are taken under a shared gate, so a whole-table reset can wait out every
//! in-flight write and keep new ones out until it is done.

use crate::error::{RankingError, Result};
use crate::types::DeckSize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{
    Mutex as AsyncMutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard,
    RwLock as AsyncRwLock,
};

/// Held for the duration of one partition write
#[derive(Debug)]
pub struct PartitionGuard {
    _partition: OwnedMutexGuard<()>,
    _gate: OwnedRwLockReadGuard<()>,
}

/// Held while every partition is blocked
#[derive(Debug)]
pub struct ExclusiveGuard {
    _gate: OwnedRwLockWriteGuard<()>,
}

/// Lazily created async mutex per deck size
#[derive(Debug, Default)]
pub struct PartitionLocks {
    locks: Mutex<HashMap<DeckSize, Arc<AsyncMutex<()>>>>,
    gate: Arc<AsyncRwLock<()>>,
}

impl PartitionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `deck_size`
    pub async fn acquire(&self, deck_size: DeckSize) -> Result<PartitionGuard> {
        let gate = Arc::clone(&self.gate).read_owned().await;

        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| RankingError::storage("Failed to acquire partition lock table"))?;
            Arc::clone(locks.entry(deck_size).or_default())
        };

        Ok(PartitionGuard {
            _partition: lock.lock_owned().await,
            _gate: gate,
        })
    }

    /// Wait until no partition is held, then block all of them
    pub async fn acquire_all(&self) -> ExclusiveGuard {
        ExclusiveGuard {
            _gate: Arc::clone(&self.gate).write_owned().await,
        }
    }

    /// Number of deck sizes that have been locked at least once
    pub fn len(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
