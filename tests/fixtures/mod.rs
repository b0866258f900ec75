//! Test fixtures and helpers for integration testing

#![allow(dead_code)]

use pairs_ranking::config::{LeaderboardSettings, RankingSettings};
use pairs_ranking::service::{
    LeaderboardQueryService, MaintenanceService, PartitionLocks, ScoreSubmissionCoordinator,
};
use pairs_ranking::storage::{InMemoryCounterStore, InMemoryScoreRepository};
use pairs_ranking::types::{
    ColumnSort, DeckSize, LeaderboardQuery, ScoreSubmission, ScoreWithPercentiles,
};
use std::sync::Arc;

/// Every service wired over shared in-memory stores
pub struct TestSystem {
    pub scores: Arc<InMemoryScoreRepository>,
    pub counters: Arc<InMemoryCounterStore>,
    pub coordinator: Arc<ScoreSubmissionCoordinator>,
    pub leaderboard: LeaderboardQueryService,
    pub maintenance: MaintenanceService,
}

pub fn create_test_system() -> TestSystem {
    create_test_system_with(RankingSettings::default())
}

pub fn create_test_system_with(settings: RankingSettings) -> TestSystem {
    let scores = Arc::new(InMemoryScoreRepository::new());
    let counters = Arc::new(InMemoryCounterStore::new());
    let locks = Arc::new(PartitionLocks::new());

    let coordinator = Arc::new(
        ScoreSubmissionCoordinator::new(scores.clone(), counters.clone(), settings)
            .with_locks(locks.clone()),
    );
    let leaderboard = LeaderboardQueryService::new(
        scores.clone(),
        counters.clone(),
        LeaderboardSettings::default(),
    );
    let maintenance = MaintenanceService::new(scores.clone(), counters.clone(), locks);

    TestSystem {
        scores,
        counters,
        coordinator,
        leaderboard,
        maintenance,
    }
}

/// A full-deck game for `user_id`
pub fn submission(
    user_id: &str,
    deck_size: i64,
    mismatches: i64,
    game_time_units: i64,
) -> ScoreSubmission {
    ScoreSubmission {
        deck_size,
        mismatches,
        game_time_units,
        pairs: deck_size / 2,
        initials: initials_for(user_id),
        user_id: user_id.to_string(),
        color: "33aa77".to_string(),
        pixel_avatar: "0101".to_string(),
    }
}

/// Up to three uppercase letters derived from a user id
fn initials_for(user_id: &str) -> String {
    let initials: String = user_id
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    if initials.is_empty() {
        "ANO".to_string()
    } else {
        initials
    }
}

/// Submissions for one deck size with the given (mismatches, time) pairs
pub fn create_test_submissions(deck_size: i64, games: &[(i64, i64)]) -> Vec<ScoreSubmission> {
    games
        .iter()
        .enumerate()
        .map(|(i, &(mismatches, time))| {
            submission(&format!("player{}", i), deck_size, mismatches, time)
        })
        .collect()
}

pub fn query(
    page_number: u32,
    results_per_page: u32,
    deck_sizes_filter: Vec<DeckSize>,
    sort_by_column_history: Vec<ColumnSort>,
) -> LeaderboardQuery {
    LeaderboardQuery {
        page_number,
        results_per_page,
        deck_sizes_filter,
        sort_by_column_history,
    }
}

pub fn entry_ids(entries: &[ScoreWithPercentiles]) -> Vec<u64> {
    entries.iter().map(|entry| entry.score.id).collect()
}
