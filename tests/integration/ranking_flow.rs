//! End-to-end submission and leaderboard tests
//!
//! Scores go in through the submission coordinator and come back out through
//! leaderboard queries, with rebuilds and verification in between.

use pairs_ranking::error::ranking_error;
use pairs_ranking::service::PartitionReport;
use pairs_ranking::storage::{PartitionCounterStore, ScoreRepository};
use pairs_ranking::types::{ColumnSort, SortColumn, SortDirection};
use pairs_ranking::RankingError;

use crate::fixtures::{create_test_submissions, create_test_system, entry_ids, query, submission};

#[tokio::test]
async fn test_partition_history_walkthrough() {
    let system = create_test_system();

    // Empty partition: the first score beats nobody
    let first = system
        .coordinator
        .submit(submission("alice", 12, 2, 300))
        .await
        .unwrap();
    assert_eq!(first.mismatch_percentile, 0.0);

    // A worse score also beats nobody, but the first one now beats it
    let second = system
        .coordinator
        .submit(submission("bob", 12, 5, 400))
        .await
        .unwrap();
    assert_eq!(second.mismatch_percentile, 0.0);

    let page = system
        .leaderboard
        .query(&query(1, 10, vec![12], vec![]))
        .await
        .unwrap();
    assert_eq!(page.entries[0].score.id, first.score_id);
    assert_eq!(page.entries[0].mismatch_percentile, Some(50.0));
    assert_eq!(page.entries[1].mismatch_percentile, Some(0.0));

    // Tie with the best value
    let tie = system
        .coordinator
        .submit(submission("carol", 12, 2, 350))
        .await
        .unwrap();
    assert_eq!(tie.mismatch_percentile, 33.33);

    // New minimum
    let best = system
        .coordinator
        .submit(submission("dave", 12, 1, 500))
        .await
        .unwrap();
    assert_eq!(best.mismatch_percentile, 75.0);
    assert_eq!(best.game_time_percentile, 0.0);

    assert!(system
        .maintenance
        .verify_partition(12)
        .await
        .unwrap()
        .is_consistent());
}

#[tokio::test]
async fn test_queries_are_idempotent() {
    let system = create_test_system();
    for game in create_test_submissions(16, &[(4, 900), (2, 700), (6, 650), (2, 800)]) {
        system.coordinator.submit(game).await.unwrap();
    }

    let request = query(
        1,
        10,
        vec![16],
        vec![ColumnSort::new(
            SortColumn::MismatchPercentile,
            SortDirection::Desc,
        )],
    );
    let first = system.leaderboard.query(&request).await.unwrap();
    let second = system.leaderboard.query(&request).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.total_matching, 4);
    assert_eq!(
        system.counters.load(16).await.unwrap().unwrap().total_scores,
        4
    );
}

#[tokio::test]
async fn test_deck_size_filter_and_paging() {
    let system = create_test_system();
    for game in create_test_submissions(12, &[(1, 100), (2, 200), (3, 300)]) {
        system.coordinator.submit(game).await.unwrap();
    }
    for game in create_test_submissions(20, &[(5, 500), (4, 400)]) {
        system.coordinator.submit(game).await.unwrap();
    }

    let all = system
        .leaderboard
        .query(&query(1, 10, vec![], vec![]))
        .await
        .unwrap();
    assert_eq!(all.total_matching, 5);
    assert_eq!(entry_ids(&all.entries), vec![1, 2, 3, 4, 5]);

    let second_page = system
        .leaderboard
        .query(&query(2, 2, vec![12, 20], vec![]))
        .await
        .unwrap();
    assert_eq!(second_page.total_matching, 5);
    assert_eq!(entry_ids(&second_page.entries), vec![3, 4]);

    let deck_20 = system
        .leaderboard
        .query(&query(1, 10, vec![20], vec![]))
        .await
        .unwrap();
    assert_eq!(entry_ids(&deck_20.entries), vec![4, 5]);
    // 4 mismatches beats 5
    assert_eq!(deck_20.entries[1].mismatch_percentile, Some(50.0));

    let unknown = system
        .leaderboard
        .query(&query(1, 10, vec![40], vec![]))
        .await
        .unwrap();
    assert!(unknown.entries.is_empty());
    assert_eq!(unknown.total_matching, 0);

    let past_end = system
        .leaderboard
        .query(&query(9, 10, vec![], vec![]))
        .await
        .unwrap();
    assert!(past_end.entries.is_empty());
    assert_eq!(past_end.total_matching, 5);
}

#[tokio::test]
async fn test_column_priority_sort() {
    let system = create_test_system();
    for game in create_test_submissions(12, &[(3, 300), (1, 500), (3, 200), (1, 400)]) {
        system.coordinator.submit(game).await.unwrap();
    }

    let page = system
        .leaderboard
        .query(&query(
            1,
            10,
            vec![12],
            vec![
                ColumnSort::new(SortColumn::Mismatches, SortDirection::Asc),
                ColumnSort::new(SortColumn::GameTime, SortDirection::Asc),
            ],
        ))
        .await
        .unwrap();

    assert_eq!(entry_ids(&page.entries), vec![4, 2, 3, 1]);
}

#[tokio::test]
async fn test_sort_spans_every_matching_score() {
    let system = create_test_system();
    // ids 1..=30 carry mismatches 29..=0, so the best games arrive last
    let games: Vec<(i64, i64)> = (0..30).map(|i| (29 - i, 300)).collect();
    for game in create_test_submissions(12, &games) {
        system.coordinator.submit(game).await.unwrap();
    }
    system.coordinator.submit(submission("olga", 20, 0, 100)).await.unwrap();
    assert_eq!(system.scores.count_for_deck(12).await.unwrap(), 30);

    let best_first = vec![ColumnSort::new(
        SortColumn::MismatchPercentile,
        SortDirection::Desc,
    )];
    let first_page = system
        .leaderboard
        .query(&query(1, 10, vec![12], best_first.clone()))
        .await
        .unwrap();

    assert_eq!(first_page.total_matching, 30);
    assert_eq!(entry_ids(&first_page.entries), (21..=30).rev().collect::<Vec<u64>>());
    assert_eq!(first_page.entries[0].score.mismatches, 0);
    assert_eq!(first_page.entries[0].mismatch_percentile, Some(96.67));
    assert_eq!(first_page.entries[9].mismatch_percentile, Some(66.67));

    let last_page = system
        .leaderboard
        .query(&query(3, 10, vec![12], best_first))
        .await
        .unwrap();
    assert_eq!(entry_ids(&last_page.entries), (1..=10).rev().collect::<Vec<u64>>());
    assert_eq!(last_page.entries[9].mismatch_percentile, Some(0.0));
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let system = create_test_system();

    let err = system
        .coordinator
        .submit(submission("eve", 7, 1, 100))
        .await
        .unwrap_err();
    assert!(matches!(
        ranking_error(&err),
        Some(RankingError::Validation { .. })
    ));

    let err = system
        .coordinator
        .submit(submission("eve", 12, -1, 100))
        .await
        .unwrap_err();
    assert!(matches!(
        ranking_error(&err),
        Some(RankingError::Validation { .. })
    ));

    let too_many_columns = vec![
        ColumnSort::new(SortColumn::Id, SortDirection::Asc),
        ColumnSort::new(SortColumn::Pairs, SortDirection::Asc),
        ColumnSort::new(SortColumn::Initials, SortDirection::Asc),
        ColumnSort::new(SortColumn::CreatedAt, SortDirection::Desc),
    ];
    let err = system
        .leaderboard
        .query(&query(1, 10, vec![], too_many_columns))
        .await
        .unwrap_err();
    assert!(matches!(
        ranking_error(&err),
        Some(RankingError::Validation { .. })
    ));

    assert_eq!(system.counters.partition_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_corrupt_partition_recovers_through_rebuild() {
    let system = create_test_system();
    for game in create_test_submissions(14, &[(2, 220), (4, 180)]) {
        system.coordinator.submit(game).await.unwrap();
    }

    let mut row = system.counters.load(14).await.unwrap().unwrap();
    row.worse_than_mismatches_map = "not json".to_string();
    system.counters.put_raw(row).unwrap();

    let err = system
        .coordinator
        .submit(submission("frank", 14, 3, 200))
        .await
        .unwrap_err();
    assert!(matches!(
        ranking_error(&err),
        Some(RankingError::CorruptPartitionData { deck_size: 14, .. })
    ));
    assert!(system
        .leaderboard
        .query(&query(1, 10, vec![14], vec![]))
        .await
        .is_err());

    // The score itself was kept; the rebuild counts it
    let rebuilt = system.maintenance.rebuild_partition(14).await.unwrap();
    assert_eq!(rebuilt.total_scores, 3);
    assert_eq!(
        system.maintenance.verify_partition(14).await.unwrap(),
        PartitionReport::Consistent { total_scores: 3 }
    );

    let page = system
        .leaderboard
        .query(&query(1, 10, vec![14], vec![]))
        .await
        .unwrap();
    let percentiles: Vec<Option<f64>> = page
        .entries
        .iter()
        .map(|entry| entry.mismatch_percentile)
        .collect();
    assert_eq!(
        percentiles,
        vec![Some(66.67), Some(0.0), Some(33.33)]
    );
}

#[tokio::test]
async fn test_clear_all_starts_fresh() {
    let system = create_test_system();
    for game in create_test_submissions(12, &[(1, 100), (2, 200)]) {
        system.coordinator.submit(game).await.unwrap();
    }

    system.maintenance.clear_all().await.unwrap();

    let page = system
        .leaderboard
        .query(&query(1, 10, vec![], vec![]))
        .await
        .unwrap();
    assert!(page.entries.is_empty());

    let receipt = system
        .coordinator
        .submit(submission("gina", 12, 9, 900))
        .await
        .unwrap();
    assert_eq!(receipt.mismatch_percentile, 0.0);
    assert_eq!(receipt.score_id, 3);
}
