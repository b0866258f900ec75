//! Score record storage interface and implementations
//!
//! The `scores` table is owned by an external storage engine. This module
//! defines the interface the ranking service needs from it, with an in-memory
//! implementation for single-process deployments and tests.

use crate::error::{RankingError, Result};
use crate::types::{DeckSize, NewScore, ScoreId, ScoreRecord};
use crate::utils::current_timestamp;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::RwLock;

/// A window of score records plus the size of the full result set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorePage {
    /// Records in ascending id order
    pub records: Vec<ScoreRecord>,
    pub total_matching: u64,
}

/// Trait for score record storage operations
#[async_trait]
pub trait ScoreRepository: Send + Sync {
    /// Persist a new score, assigning its id and creation time
    async fn insert(&self, score: NewScore) -> Result<ScoreRecord>;

    /// Records whose deck size is in `deck_sizes` (all when empty), in
    /// ascending id order, skipping `offset` and returning at most `limit`
    async fn page(&self, deck_sizes: &[DeckSize], offset: usize, limit: usize)
        -> Result<ScorePage>;

    /// Every record whose deck size is in `deck_sizes` (all when empty), in
    /// ascending id order
    async fn matching(&self, deck_sizes: &[DeckSize]) -> Result<Vec<ScoreRecord>>;

    /// Every record of one deck size, for offline rebuilds
    async fn scores_for_deck(&self, deck_size: DeckSize) -> Result<Vec<ScoreRecord>>;

    /// Number of records of one deck size
    async fn count_for_deck(&self, deck_size: DeckSize) -> Result<u64>;

    /// Distinct deck sizes with at least one record, ascending
    async fn deck_sizes(&self) -> Result<Vec<DeckSize>>;

    /// Total number of records
    async fn total_count(&self) -> Result<u64>;

    /// Remove every record (administrative reset)
    async fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default)]
struct ScoreTable {
    records: Vec<ScoreRecord>,
    last_id: ScoreId,
}

/// In-memory score repository
#[derive(Debug, Default)]
pub struct InMemoryScoreRepository {
    table: RwLock<ScoreTable>,
}

impl InMemoryScoreRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_table(&self) -> Result<std::sync::RwLockReadGuard<'_, ScoreTable>> {
        self.table.read().map_err(|_| {
            RankingError::storage("Failed to acquire scores read lock").into()
        })
    }

    fn write_table(&self) -> Result<std::sync::RwLockWriteGuard<'_, ScoreTable>> {
        self.table.write().map_err(|_| {
            RankingError::storage("Failed to acquire scores write lock").into()
        })
    }
}

#[async_trait]
impl ScoreRepository for InMemoryScoreRepository {
    async fn insert(&self, score: NewScore) -> Result<ScoreRecord> {
        let mut table = self.write_table()?;

        // ids keep increasing across clears
        table.last_id += 1;
        let record = ScoreRecord::from_new(table.last_id, score, current_timestamp());
        table.records.push(record.clone());

        Ok(record)
    }

    async fn page(
        &self,
        deck_sizes: &[DeckSize],
        offset: usize,
        limit: usize,
    ) -> Result<ScorePage> {
        let table = self.read_table()?;

        let matching: Vec<&ScoreRecord> = table
            .records
            .iter()
            .filter(|record| deck_sizes.is_empty() || deck_sizes.contains(&record.deck_size))
            .collect();

        let records = matching
            .iter()
            .skip(offset)
            .take(limit)
            .map(|record| (*record).clone())
            .collect();

        Ok(ScorePage {
            records,
            total_matching: matching.len() as u64,
        })
    }

    async fn matching(&self, deck_sizes: &[DeckSize]) -> Result<Vec<ScoreRecord>> {
        let table = self.read_table()?;

        Ok(table
            .records
            .iter()
            .filter(|record| deck_sizes.is_empty() || deck_sizes.contains(&record.deck_size))
            .cloned()
            .collect())
    }

    async fn scores_for_deck(&self, deck_size: DeckSize) -> Result<Vec<ScoreRecord>> {
        let table = self.read_table()?;

        Ok(table
            .records
            .iter()
            .filter(|record| record.deck_size == deck_size)
            .cloned()
            .collect())
    }

    async fn count_for_deck(&self, deck_size: DeckSize) -> Result<u64> {
        let table = self.read_table()?;

        Ok(table
            .records
            .iter()
            .filter(|record| record.deck_size == deck_size)
            .count() as u64)
    }

    async fn deck_sizes(&self) -> Result<Vec<DeckSize>> {
        let table = self.read_table()?;

        let sizes: BTreeSet<DeckSize> = table.records.iter().map(|r| r.deck_size).collect();
        Ok(sizes.into_iter().collect())
    }

    async fn total_count(&self) -> Result<u64> {
        Ok(self.read_table()?.records.len() as u64)
    }

    async fn clear(&self) -> Result<()> {
        self.write_table()?.records.clear();
        Ok(())
    }
}
