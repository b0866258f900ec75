//! Ranking engine
//!
//! Pure, synchronous update of a partition's counters with one new score.
//! Callers are responsible for serializing calls per deck size.

use crate::error::RankingError;
use crate::ranking::partition::PartitionCounters;
use crate::ranking::percentile::percentile;
use crate::types::{Percentile, ScoreRecord};
use serde::{Deserialize, Serialize};

/// Outcome of ranking one new score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingOutcome {
    pub counters: PartitionCounters,
    pub mismatch_percentile: Percentile,
    pub game_time_percentile: Percentile,
    /// Whether each map gained a new value (mismatches, game time)
    pub new_values: (bool, bool),
}

/// Stateless ranking engine
#[derive(Debug, Clone, Copy, Default)]
pub struct RankingEngine;

impl RankingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Add `score` to `counters` (or start a partition) and rank it.
    ///
    /// Percentiles are computed against the total including `score` itself.
    pub fn submit(
        &self,
        counters: Option<&PartitionCounters>,
        score: &ScoreRecord,
    ) -> std::result::Result<RankingOutcome, RankingError> {
        let Some(current) = counters else {
            return Ok(RankingOutcome {
                counters: PartitionCounters::first(score),
                mismatch_percentile: 0.0,
                game_time_percentile: 0.0,
                new_values: (true, true),
            });
        };

        if current.deck_size != score.deck_size {
            return Err(RankingError::validation(format!(
                "score for deck size {} ranked against partition {}",
                score.deck_size, current.deck_size
            )));
        }

        let total = current.total_scores;
        let mismatches = current.worse_than_mismatches.insert(total, score.mismatches);
        let game_time = current
            .worse_than_game_time
            .insert(total, score.game_time_units);
        let new_total = total + 1;

        Ok(RankingOutcome {
            mismatch_percentile: percentile(mismatches.own_worse_count, new_total),
            game_time_percentile: percentile(game_time.own_worse_count, new_total),
            new_values: (mismatches.inserted_key, game_time.inserted_key),
            counters: PartitionCounters {
                deck_size: current.deck_size,
                total_scores: new_total,
                worse_than_mismatches: mismatches.map,
                worse_than_game_time: game_time.map,
            },
        })
    }
}
