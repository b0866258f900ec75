//! Leaderboard paging configuration

use serde::{Deserialize, Serialize};

/// Most columns a sort history may hold
pub const MAX_SORT_COLUMNS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardSettings {
    pub default_results_per_page: u32,
    pub max_results_per_page: u32,
}

impl Default for LeaderboardSettings {
    fn default() -> Self {
        Self {
            default_results_per_page: 25,
            max_results_per_page: 100,
        }
    }
}
