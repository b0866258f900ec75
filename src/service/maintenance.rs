//! Offline maintenance of partition counters
//!
//! Rebuilds recompute a partition from every stored score instead of the
//! incremental path, which is the supported recovery for corrupt counters.
//! Rebuilds and verification hold the partition lock, and a full clear holds
//! every partition, so they never interleave with submissions in this process.

use crate::error::{RankingError, Result};
use crate::metrics::MetricsCollector;
use crate::ranking::partition::PartitionCounters;
use crate::service::locks::PartitionLocks;
use crate::storage::{CasOutcome, PartitionCounterStore, ScoreRepository};
use crate::types::{DeckSize, ScoreMetric};
use crate::utils::{current_timestamp, elapsed_ms};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Result of comparing stored counters against a full recomputation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PartitionReport {
    /// Stored counters equal a rebuild
    Consistent { total_scores: u64 },
    /// Scores exist but no counters row does
    MissingCounters { stored_scores: u64 },
    /// Counters exist but no scores do
    OrphanedCounters { total_scores: u64 },
    /// Counted total disagrees with the number of stored scores
    TotalMismatch {
        counted_scores: u64,
        stored_scores: u64,
    },
    /// Totals agree but a worse-than map does not
    MapMismatch { metric: ScoreMetric },
    /// Counters fail to parse or violate an invariant
    Corrupt { reason: String },
}

impl PartitionReport {
    pub fn is_consistent(&self) -> bool {
        matches!(self, PartitionReport::Consistent { .. })
    }
}

/// Rebuild, verification and reset operations
pub struct MaintenanceService {
    scores: Arc<dyn ScoreRepository>,
    counters: Arc<dyn PartitionCounterStore>,
    locks: Arc<PartitionLocks>,
    max_attempts: u32,
    metrics: Option<Arc<MetricsCollector>>,
}

impl MaintenanceService {
    pub fn new(
        scores: Arc<dyn ScoreRepository>,
        counters: Arc<dyn PartitionCounterStore>,
        locks: Arc<PartitionLocks>,
    ) -> Self {
        Self {
            scores,
            counters,
            locks,
            max_attempts: 5,
            metrics: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Recompute one partition's counters from the scores table
    pub async fn rebuild_partition(&self, deck_size: DeckSize) -> Result<PartitionCounters> {
        let start_time = Instant::now();
        let _partition_guard = self.locks.acquire(deck_size).await?;

        let scores = self.scores.scores_for_deck(deck_size).await?;
        let rebuilt = PartitionCounters::rebuild(deck_size, &scores);
        if rebuilt.total_scores == 0 {
            return Err(RankingError::validation(format!(
                "no scores recorded for deck size {}",
                deck_size
            ))
            .into());
        }

        for attempt in 1..=self.max_attempts {
            // Read the raw row only for its version; its contents may be corrupt
            let existing = self.counters.load(deck_size).await?;
            let now = current_timestamp();
            let expected_version = existing.as_ref().map(|row| row.version);
            let created_at = existing.as_ref().map_or(now, |row| row.created_at);
            let row = rebuilt.to_stored(expected_version.map_or(1, |v| v + 1), created_at, now)?;

            match self.counters.compare_and_swap(expected_version, row).await? {
                CasOutcome::Applied { version } => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_rebuild(deck_size);
                        metrics.update_partition(&rebuilt);
                    }
                    info!(
                        "Rebuilt partition {} from {} scores at version {} in {:.2}ms",
                        deck_size,
                        rebuilt.total_scores,
                        version,
                        elapsed_ms(start_time)
                    );
                    return Ok(rebuilt);
                }
                CasOutcome::Conflict { current_version } => {
                    warn!(
                        "Rebuild of partition {} raced another writer (found {:?}), attempt {}/{}",
                        deck_size, current_version, attempt, self.max_attempts
                    );
                }
            }
        }

        Err(RankingError::ConcurrencyConflict {
            deck_size,
            attempts: self.max_attempts,
        }
        .into())
    }

    /// Rebuild every deck size present in the scores table
    pub async fn rebuild_all(&self) -> Result<Vec<PartitionCounters>> {
        let deck_sizes = self.scores.deck_sizes().await?;
        let mut rebuilt = Vec::with_capacity(deck_sizes.len());
        for deck_size in deck_sizes {
            rebuilt.push(self.rebuild_partition(deck_size).await?);
        }
        Ok(rebuilt)
    }

    /// Compare stored counters with a recomputation without changing them
    pub async fn verify_partition(&self, deck_size: DeckSize) -> Result<PartitionReport> {
        let _partition_guard = self.locks.acquire(deck_size).await?;

        let scores = self.scores.scores_for_deck(deck_size).await?;
        let expected = PartitionCounters::rebuild(deck_size, &scores);
        let stored_scores = expected.total_scores;

        let report = match self.counters.load(deck_size).await? {
            None if stored_scores == 0 => PartitionReport::Consistent { total_scores: 0 },
            None => PartitionReport::MissingCounters { stored_scores },
            Some(row) => match PartitionCounters::from_stored(&row) {
                Err(e) => PartitionReport::Corrupt {
                    reason: e.to_string(),
                },
                Ok(_) if stored_scores == 0 => PartitionReport::OrphanedCounters {
                    total_scores: row.total_scores,
                },
                Ok(current) if current == expected => PartitionReport::Consistent {
                    total_scores: current.total_scores,
                },
                Ok(current) if current.total_scores != stored_scores => {
                    PartitionReport::TotalMismatch {
                        counted_scores: current.total_scores,
                        stored_scores,
                    }
                }
                Ok(current) => {
                    let metric = ScoreMetric::ALL
                        .into_iter()
                        .find(|metric| current.map_for(*metric) != expected.map_for(*metric))
                        .unwrap_or(ScoreMetric::Mismatches);
                    PartitionReport::MapMismatch { metric }
                }
            },
        };

        if !report.is_consistent() {
            error!("Partition {} failed verification: {:?}", deck_size, report);
        }
        Ok(report)
    }

    /// Truncate the scores and counters tables.
    ///
    /// Waits for in-flight partition writes and holds off new ones until both
    /// tables are empty. Used for reseeding and test fixtures only.
    pub async fn clear_all(&self) -> Result<()> {
        let _all_partitions = self.locks.acquire_all().await;
        warn!("Clearing all scores and partition counters");
        self.scores.clear().await?;
        self.counters.clear().await?;
        if let Some(metrics) = &self.metrics {
            metrics.reset_partitions();
        }
        Ok(())
    }
}
