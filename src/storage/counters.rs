//! Partition counter storage interface and implementations
//!
//! Rows of the `score_counts` table are only ever replaced whole, through a
//! compare-and-swap on their version. Two writers that read the same version
//! cannot both succeed.

use crate::error::{RankingError, Result};
use crate::ranking::partition::StoredPartitionCounters;
use crate::types::DeckSize;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::debug;

/// Result of a compare-and-swap write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CasOutcome {
    /// The row was written with this version
    Applied { version: u64 },
    /// Another writer got there first; the row is at `current_version`
    Conflict { current_version: Option<u64> },
}

/// Trait for partition counter storage operations
#[async_trait]
pub trait PartitionCounterStore: Send + Sync {
    /// Get the counters row for a deck size
    async fn load(&self, deck_size: DeckSize) -> Result<Option<StoredPartitionCounters>>;

    /// Get counters rows for several deck sizes; missing ones are omitted
    async fn load_many(
        &self,
        deck_sizes: &[DeckSize],
    ) -> Result<HashMap<DeckSize, StoredPartitionCounters>>;

    /// Replace the row for `row.deck_size` if its current version equals
    /// `expected_version` (`None` means the row must not exist yet).
    ///
    /// The store assigns the new version; `row.version` is ignored.
    async fn compare_and_swap(
        &self,
        expected_version: Option<u64>,
        row: StoredPartitionCounters,
    ) -> Result<CasOutcome>;

    /// Number of stored partitions
    async fn partition_count(&self) -> Result<usize>;

    /// Remove every row (administrative reset)
    async fn clear(&self) -> Result<()>;
}

/// In-memory partition counter store.
///
/// Rows are kept in their serialized form so readers parse maps exactly as
/// they would from a database column.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    rows: RwLock<HashMap<DeckSize, StoredPartitionCounters>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a row without version checks (test fixtures and imports)
    pub fn put_raw(&self, row: StoredPartitionCounters) -> Result<()> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| RankingError::storage("Failed to acquire counters write lock"))?;
        rows.insert(row.deck_size, row);
        Ok(())
    }
}

#[async_trait]
impl PartitionCounterStore for InMemoryCounterStore {
    async fn load(&self, deck_size: DeckSize) -> Result<Option<StoredPartitionCounters>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| RankingError::storage("Failed to acquire counters read lock"))?;

        Ok(rows.get(&deck_size).cloned())
    }

    async fn load_many(
        &self,
        deck_sizes: &[DeckSize],
    ) -> Result<HashMap<DeckSize, StoredPartitionCounters>> {
        let rows = self
            .rows
            .read()
            .map_err(|_| RankingError::storage("Failed to acquire counters read lock"))?;

        let mut result = HashMap::new();
        for deck_size in deck_sizes {
            if let Some(row) = rows.get(deck_size) {
                result.insert(*deck_size, row.clone());
            }
        }

        Ok(result)
    }

    async fn compare_and_swap(
        &self,
        expected_version: Option<u64>,
        mut row: StoredPartitionCounters,
    ) -> Result<CasOutcome> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| RankingError::storage("Failed to acquire counters write lock"))?;

        let current_version = rows.get(&row.deck_size).map(|r| r.version);
        if current_version != expected_version {
            debug!(
                "Counters CAS rejected for deck size {}: expected {:?}, found {:?}",
                row.deck_size, expected_version, current_version
            );
            return Ok(CasOutcome::Conflict { current_version });
        }

        let version = expected_version.map_or(1, |v| v + 1);
        row.version = version;
        rows.insert(row.deck_size, row);

        Ok(CasOutcome::Applied { version })
    }

    async fn partition_count(&self) -> Result<usize> {
        let rows = self
            .rows
            .read()
            .map_err(|_| RankingError::storage("Failed to acquire counters read lock"))?;

        Ok(rows.len())
    }

    async fn clear(&self) -> Result<()> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| RankingError::storage("Failed to acquire counters write lock"))?;

        rows.clear();
        Ok(())
    }
}
