//! Pairs Ranking - percentile ranking for card-matching game scores
//!
//! Every submitted score is ranked against all earlier scores of the same
//! deck size in O(distinct values) per write, using per-partition
//! "worse-than" counters instead of rescanning the scores table.

pub mod config;
pub mod error;
pub mod metrics;
pub mod ranking;
pub mod service;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{RankingError, Result};
pub use types::*;

// Re-export key components
pub use ranking::{PartitionCounters, RankingEngine, WorseThanMap};
pub use service::{
    AppState, LeaderboardQueryService, MaintenanceService, ScoreSubmissionCoordinator,
};
pub use storage::{
    InMemoryCounterStore, InMemoryScoreRepository, PartitionCounterStore, ScoreRepository,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
