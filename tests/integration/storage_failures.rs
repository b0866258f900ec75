//! Storage failure handling with mocked backends

use async_trait::async_trait;
use mockall::mock;
use mockall::predicate::eq;
use pairs_ranking::config::{LeaderboardSettings, RankingSettings};
use pairs_ranking::error::{ranking_error, Result};
use pairs_ranking::ranking::StoredPartitionCounters;
use pairs_ranking::service::{LeaderboardQueryService, ScoreSubmissionCoordinator};
use pairs_ranking::storage::{CasOutcome, PartitionCounterStore, ScorePage, ScoreRepository};
use pairs_ranking::types::{DeckSize, NewScore, ScoreRecord};
use pairs_ranking::utils::current_timestamp;
use pairs_ranking::RankingError;
use std::collections::HashMap;
use std::sync::Arc;

use crate::fixtures::{query, submission};

mock! {
    pub Scores {}

    #[async_trait]
    impl ScoreRepository for Scores {
        async fn insert(&self, score: NewScore) -> Result<ScoreRecord>;
        async fn page(&self, deck_sizes: &[DeckSize], offset: usize, limit: usize) -> Result<ScorePage>;
        async fn matching(&self, deck_sizes: &[DeckSize]) -> Result<Vec<ScoreRecord>>;
        async fn scores_for_deck(&self, deck_size: DeckSize) -> Result<Vec<ScoreRecord>>;
        async fn count_for_deck(&self, deck_size: DeckSize) -> Result<u64>;
        async fn deck_sizes(&self) -> Result<Vec<DeckSize>>;
        async fn total_count(&self) -> Result<u64>;
        async fn clear(&self) -> Result<()>;
    }
}

mock! {
    pub Counters {}

    #[async_trait]
    impl PartitionCounterStore for Counters {
        async fn load(&self, deck_size: DeckSize) -> Result<Option<StoredPartitionCounters>>;
        async fn load_many(&self, deck_sizes: &[DeckSize]) -> Result<HashMap<DeckSize, StoredPartitionCounters>>;
        async fn compare_and_swap(&self, expected_version: Option<u64>, row: StoredPartitionCounters) -> Result<CasOutcome>;
        async fn partition_count(&self) -> Result<usize>;
        async fn clear(&self) -> Result<()>;
    }
}

fn stored_record(id: u64, score: NewScore) -> ScoreRecord {
    ScoreRecord::from_new(id, score, current_timestamp())
}

fn fast_retries(max_conflict_retries: u32) -> RankingSettings {
    RankingSettings {
        max_conflict_retries,
        conflict_retry_delay_ms: 0,
        ..RankingSettings::default()
    }
}

#[tokio::test]
async fn test_score_insert_failure_leaves_counters_untouched() {
    let mut scores = MockScores::new();
    scores
        .expect_insert()
        .times(1)
        .returning(|_| Err(RankingError::storage("connection reset").into()));

    // No expectations: any counter access would panic
    let counters = MockCounters::new();

    let coordinator = ScoreSubmissionCoordinator::new(
        Arc::new(scores),
        Arc::new(counters),
        RankingSettings::default(),
    );

    let err = coordinator
        .submit(submission("ivy", 12, 1, 100))
        .await
        .unwrap_err();
    assert!(matches!(
        ranking_error(&err),
        Some(RankingError::Storage { .. })
    ));
}

#[tokio::test]
async fn test_conflicts_exhaust_bounded_retries() {
    let mut scores = MockScores::new();
    scores
        .expect_insert()
        .times(1)
        .returning(|score| Ok(stored_record(1, score)));

    let mut counters = MockCounters::new();
    counters
        .expect_load()
        .with(eq(12))
        .times(4)
        .returning(|_| Ok(None));
    counters
        .expect_compare_and_swap()
        .times(4)
        .returning(|_, _| {
            Ok(CasOutcome::Conflict {
                current_version: Some(7),
            })
        });

    let coordinator =
        ScoreSubmissionCoordinator::new(Arc::new(scores), Arc::new(counters), fast_retries(3));

    let err = coordinator
        .submit(submission("jon", 12, 2, 200))
        .await
        .unwrap_err();
    assert_eq!(
        ranking_error(&err),
        Some(&RankingError::ConcurrencyConflict {
            deck_size: 12,
            attempts: 4
        })
    );
}

#[tokio::test]
async fn test_first_write_uses_insert_if_absent() {
    let mut scores = MockScores::new();
    scores
        .expect_insert()
        .returning(|score| Ok(stored_record(42, score)));

    let mut counters = MockCounters::new();
    counters.expect_load().returning(|_| Ok(None));
    counters
        .expect_compare_and_swap()
        .withf(|expected, row| {
            expected.is_none()
                && row.deck_size == 18
                && row.total_scores == 1
                && row.worse_than_mismatches_map == r#"{"3":0}"#
        })
        .times(1)
        .returning(|_, _| Ok(CasOutcome::Applied { version: 1 }));

    let coordinator = ScoreSubmissionCoordinator::new(
        Arc::new(scores),
        Arc::new(counters),
        RankingSettings::default(),
    );

    let receipt = coordinator
        .submit(submission("kay", 18, 3, 310))
        .await
        .unwrap();
    assert_eq!(receipt.score_id, 42);
    assert_eq!(receipt.mismatch_percentile, 0.0);
}

#[tokio::test]
async fn test_leaderboard_surfaces_storage_errors() {
    let mut scores = MockScores::new();
    scores
        .expect_page()
        .returning(|_, _, _| Err(RankingError::storage("timeout").into()));

    let leaderboard = LeaderboardQueryService::new(
        Arc::new(scores),
        Arc::new(MockCounters::new()),
        LeaderboardSettings::default(),
    );

    assert!(leaderboard
        .query(&query(1, 10, vec![12], vec![]))
        .await
        .is_err());
}

#[tokio::test]
async fn test_leaderboard_without_partition_row_fails_soft() {
    let mut scores = MockScores::new();
    scores.expect_page().returning(|_, _, _| {
        Ok(ScorePage {
            records: vec![stored_record(
                1,
                NewScore {
                    deck_size: 24,
                    mismatches: 2,
                    game_time_units: 640,
                    pairs: 12,
                    initials: "LUZ".to_string(),
                    user_id: "luz".to_string(),
                    color: "ffffff".to_string(),
                    pixel_avatar: "1".to_string(),
                },
            )],
            total_matching: 1,
        })
    });

    let mut counters = MockCounters::new();
    counters
        .expect_load_many()
        .times(1)
        .returning(|_| Ok(HashMap::new()));

    let leaderboard = LeaderboardQueryService::new(
        Arc::new(scores),
        Arc::new(counters),
        LeaderboardSettings::default(),
    );

    let page = leaderboard
        .query(&query(1, 10, vec![24], vec![]))
        .await
        .unwrap();
    assert_eq!(page.entries.len(), 1);
    assert_eq!(page.entries[0].mismatch_percentile, None);
    assert_eq!(page.entries[0].game_time_percentile, None);
}
