//! Per-deck-size counters and their storage representation
//!
//! [`PartitionCounters`] is the in-memory aggregate the ranking engine works
//! on. [`StoredPartitionCounters`] is the `score_counts` row shape, with both
//! maps serialized to JSON text and a version used for compare-and-swap
//! writes.

use crate::error::{RankingError, Result};
use crate::ranking::percentile::percentile_of;
use crate::ranking::worse_than::WorseThanMap;
use crate::types::{DeckSize, Percentile, ScoreMetric, ScoreRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Aggregate counters for every score of one deck size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionCounters {
    pub deck_size: DeckSize,
    pub total_scores: u64,
    pub worse_than_mismatches: WorseThanMap,
    pub worse_than_game_time: WorseThanMap,
}

impl PartitionCounters {
    /// Counters for a partition whose first score is `score`
    pub fn first(score: &ScoreRecord) -> Self {
        Self {
            deck_size: score.deck_size,
            total_scores: 1,
            worse_than_mismatches: WorseThanMap::singleton(score.mismatches),
            worse_than_game_time: WorseThanMap::singleton(score.game_time_units),
        }
    }

    /// Recompute counters from the complete set of scores for `deck_size`.
    ///
    /// Scores of other deck sizes are ignored.
    pub fn rebuild<'a, I>(deck_size: DeckSize, scores: I) -> Self
    where
        I: IntoIterator<Item = &'a ScoreRecord>,
    {
        let mut mismatches = Vec::new();
        let mut game_times = Vec::new();
        for score in scores.into_iter().filter(|s| s.deck_size == deck_size) {
            mismatches.push(score.mismatches);
            game_times.push(score.game_time_units);
        }

        Self {
            deck_size,
            total_scores: mismatches.len() as u64,
            worse_than_mismatches: WorseThanMap::from_values(mismatches),
            worse_than_game_time: WorseThanMap::from_values(game_times),
        }
    }

    pub fn map_for(&self, metric: ScoreMetric) -> &WorseThanMap {
        match metric {
            ScoreMetric::Mismatches => &self.worse_than_mismatches,
            ScoreMetric::GameTime => &self.worse_than_game_time,
        }
    }

    /// Current percentile of a recorded score, `None` if its value is unknown
    pub fn percentile_for(&self, metric: ScoreMetric, score: &ScoreRecord) -> Option<Percentile> {
        percentile_of(
            self.map_for(metric),
            metric.value_of(score),
            self.total_scores,
        )
    }

    /// Verify the invariants a loaded partition must satisfy
    pub fn validate(&self) -> std::result::Result<(), RankingError> {
        if self.total_scores == 0 {
            return Err(RankingError::corrupt(
                self.deck_size,
                "stored partition holds no scores",
            ));
        }
        for metric in ScoreMetric::ALL {
            self.map_for(metric)
                .check_invariants(self.total_scores)
                .map_err(|reason| {
                    RankingError::corrupt(self.deck_size, format!("{} map: {}", metric, reason))
                })?;
        }
        Ok(())
    }

    /// Serialize into a storage row carrying `version`
    pub fn to_stored(
        &self,
        version: u64,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<StoredPartitionCounters> {
        Ok(StoredPartitionCounters {
            deck_size: self.deck_size,
            total_scores: self.total_scores,
            worse_than_mismatches_map: serde_json::to_string(&self.worse_than_mismatches)?,
            worse_than_game_time_map: serde_json::to_string(&self.worse_than_game_time)?,
            version,
            created_at,
            updated_at,
        })
    }

    /// Parse and validate a storage row.
    ///
    /// Any parse failure or invariant violation is reported as
    /// [`RankingError::CorruptPartitionData`].
    pub fn from_stored(row: &StoredPartitionCounters) -> std::result::Result<Self, RankingError> {
        let parse = |metric: ScoreMetric, text: &str| {
            serde_json::from_str::<WorseThanMap>(text).map_err(|e| {
                RankingError::corrupt(row.deck_size, format!("{} map: {}", metric, e))
            })
        };

        let counters = Self {
            deck_size: row.deck_size,
            total_scores: row.total_scores,
            worse_than_mismatches: parse(ScoreMetric::Mismatches, &row.worse_than_mismatches_map)?,
            worse_than_game_time: parse(ScoreMetric::GameTime, &row.worse_than_game_time_map)?,
        };
        counters.validate()?;
        Ok(counters)
    }
}

/// One row of the `score_counts` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPartitionCounters {
    pub deck_size: DeckSize,
    pub total_scores: u64,
    /// JSON object keyed by mismatch count
    pub worse_than_mismatches_map: String,
    /// JSON object keyed by game time units
    pub worse_than_game_time_map: String,
    /// Bumped on every write, used for compare-and-swap
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
