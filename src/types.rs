//! Common types used throughout the ranking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of cards in a game; partitions scores
pub type DeckSize = u32;

/// Unique, monotonically assigned score identifier
pub type ScoreId = u64;

/// Percentile in `[0, 100]`, rounded to two decimals
pub type Percentile = f64;

/// The two ordinal metrics a score is ranked by (lower is better for both)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreMetric {
    Mismatches,
    GameTime,
}

impl ScoreMetric {
    pub const ALL: [ScoreMetric; 2] = [ScoreMetric::Mismatches, ScoreMetric::GameTime];

    /// Raw value of this metric on a score
    pub fn value_of(&self, score: &ScoreRecord) -> u64 {
        match self {
            ScoreMetric::Mismatches => score.mismatches,
            ScoreMetric::GameTime => score.game_time_units,
        }
    }
}

impl std::fmt::Display for ScoreMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScoreMetric::Mismatches => write!(f, "mismatches"),
            ScoreMetric::GameTime => write!(f, "game_time"),
        }
    }
}

/// Score submission as received from the game client.
///
/// Integer fields are signed so that negative values reach validation
/// instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSubmission {
    pub deck_size: i64,
    pub mismatches: i64,
    /// Elapsed time in deciseconds
    pub game_time_units: i64,
    pub pairs: i64,
    pub initials: String,
    pub user_id: String,
    pub color: String,
    pub pixel_avatar: String,
}

/// A validated score that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewScore {
    pub deck_size: DeckSize,
    pub mismatches: u64,
    pub game_time_units: u64,
    pub pairs: u32,
    pub initials: String,
    pub user_id: String,
    pub color: String,
    pub pixel_avatar: String,
}

/// A persisted score. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub id: ScoreId,
    pub deck_size: DeckSize,
    pub mismatches: u64,
    pub game_time_units: u64,
    pub pairs: u32,
    pub initials: String,
    pub user_id: String,
    pub color: String,
    pub pixel_avatar: String,
    pub created_at: DateTime<Utc>,
}

impl ScoreRecord {
    pub fn from_new(id: ScoreId, score: NewScore, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            deck_size: score.deck_size,
            mismatches: score.mismatches,
            game_time_units: score.game_time_units,
            pairs: score.pairs,
            initials: score.initials,
            user_id: score.user_id,
            color: score.color,
            pixel_avatar: score.pixel_avatar,
            created_at,
        }
    }
}

/// Returned to the client after a successful submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub score_id: ScoreId,
    pub deck_size: DeckSize,
    pub mismatch_percentile: Percentile,
    pub game_time_percentile: Percentile,
}

/// A score as shown on the leaderboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWithPercentiles {
    #[serde(flatten)]
    pub score: ScoreRecord,
    /// `None` when the partition could not rank this value
    pub mismatch_percentile: Option<Percentile>,
    pub game_time_percentile: Option<Percentile>,
}

/// Leaderboard column that can take part in sorting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Id,
    Initials,
    DeckSize,
    Pairs,
    Mismatches,
    GameTime,
    MismatchPercentile,
    GameTimePercentile,
    CreatedAt,
}

impl SortColumn {
    /// Direction used when a column is first selected
    pub fn default_direction(&self) -> SortDirection {
        match self {
            SortColumn::MismatchPercentile
            | SortColumn::GameTimePercentile
            | SortColumn::CreatedAt => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// One entry of a column-priority history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSort {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl ColumnSort {
    pub fn new(column: SortColumn, direction: SortDirection) -> Self {
        Self { column, direction }
    }
}

/// Leaderboard page request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardQuery {
    /// 1-based page index
    pub page_number: u32,
    pub results_per_page: u32,
    /// Deck sizes to include; empty means all
    #[serde(default)]
    pub deck_sizes_filter: Vec<DeckSize>,
    /// Highest priority first, at most three entries
    #[serde(default)]
    pub sort_by_column_history: Vec<ColumnSort>,
}

impl LeaderboardQuery {
    /// Offset of the first record on this page
    pub fn offset(&self) -> usize {
        (self.page_number.saturating_sub(1) as usize) * self.results_per_page as usize
    }
}

/// Leaderboard page response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardPage {
    pub entries: Vec<ScoreWithPercentiles>,
    /// Number of records matching the filter across all pages
    pub total_matching: u64,
    pub page_number: u32,
    pub results_per_page: u32,
}
