//! Ranking and submission configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Submission validation bounds and write-race handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingSettings {
    /// Smallest accepted deck size (inclusive)
    pub min_deck_size: u32,
    /// Largest accepted deck size (inclusive)
    pub max_deck_size: u32,
    /// Maximum number of characters in a player's initials
    pub max_initials_length: usize,
    /// How many lost compare-and-swap races a submission tolerates
    pub max_conflict_retries: u32,
    /// Pause between compare-and-swap attempts in milliseconds
    pub conflict_retry_delay_ms: u64,
}

impl Default for RankingSettings {
    fn default() -> Self {
        Self {
            min_deck_size: 6,
            max_deck_size: 52,
            max_initials_length: 3,
            max_conflict_retries: 5,
            conflict_retry_delay_ms: 10,
        }
    }
}

impl RankingSettings {
    pub fn conflict_retry_delay(&self) -> Duration {
        Duration::from_millis(self.conflict_retry_delay_ms)
    }
}
