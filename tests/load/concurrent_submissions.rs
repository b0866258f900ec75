//! Concurrent submission tests
//!
//! Many writers racing on the same partition must never lose an update:
//! the stored total always equals the number of accepted scores, and the
//! counters always equal a full rebuild.

use pairs_ranking::config::RankingSettings;
use pairs_ranking::service::{PartitionReport, ScoreSubmissionCoordinator};
use pairs_ranking::storage::{PartitionCounterStore, ScoreRepository};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::fixtures::{create_test_system, create_test_system_with, submission};

fn patient_settings() -> RankingSettings {
    RankingSettings {
        max_conflict_retries: 1_000,
        conflict_retry_delay_ms: 0,
        ..RankingSettings::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_same_partition() {
    let system = create_test_system();
    let concurrent_requests = 100;
    let start_time = Instant::now();

    let handles: Vec<_> = (0..concurrent_requests)
        .map(|i| {
            let coordinator = system.coordinator.clone();
            tokio::spawn(async move {
                coordinator
                    .submit(submission(
                        &format!("racer{}", i),
                        12,
                        (i % 7) as i64,
                        300 + (i * 13 % 50) as i64,
                    ))
                    .await
            })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    let duration = start_time.elapsed();

    let mut successful_requests = 0;
    for result in results {
        match result {
            Ok(Ok(_)) => successful_requests += 1,
            Ok(Err(e)) => eprintln!("Submission failed: {}", e),
            Err(e) => eprintln!("Task failed: {}", e),
        }
    }

    assert_eq!(
        successful_requests, concurrent_requests,
        "All submissions should succeed"
    );
    assert!(
        duration < Duration::from_secs(10),
        "100 submissions should complete within 10 seconds, took: {:?}",
        duration
    );

    let row = system.counters.load(12).await.unwrap().unwrap();
    assert_eq!(row.total_scores, concurrent_requests as u64);
    assert_eq!(
        system.maintenance.verify_partition(12).await.unwrap(),
        PartitionReport::Consistent {
            total_scores: concurrent_requests as u64
        }
    );
}

/// Writers that do not share in-process locks, as separate service
/// instances would, rely on compare-and-swap alone
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_unlocked_writers_serialize_through_cas() {
    let system = create_test_system_with(patient_settings());
    let other_instance = Arc::new(ScoreSubmissionCoordinator::new(
        system.scores.clone(),
        system.counters.clone(),
        patient_settings(),
    ));

    let handles: Vec<_> = (0..80)
        .map(|i| {
            let coordinator = if i % 2 == 0 {
                system.coordinator.clone()
            } else {
                other_instance.clone()
            };
            tokio::spawn(async move {
                coordinator
                    .submit(submission(
                        &format!("writer{}", i),
                        16,
                        (i % 5) as i64,
                        (i % 11) as i64 * 10,
                    ))
                    .await
            })
        })
        .collect();

    let results = futures::future::join_all(handles).await;
    let accepted = results
        .into_iter()
        .filter(|result| matches!(result, Ok(Ok(_))))
        .count();
    assert_eq!(accepted, 80);

    assert_eq!(system.scores.count_for_deck(16).await.unwrap(), 80);
    assert_eq!(
        system.maintenance.verify_partition(16).await.unwrap(),
        PartitionReport::Consistent { total_scores: 80 }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submissions_across_partitions() {
    let system = create_test_system();
    let deck_sizes = [6i64, 12, 24, 52];

    let handles: Vec<_> = (0..120)
        .map(|i| {
            let coordinator = system.coordinator.clone();
            let deck_size = deck_sizes[i % deck_sizes.len()];
            tokio::spawn(async move {
                coordinator
                    .submit(submission(
                        &format!("mixed{}", i),
                        deck_size,
                        (i % 9) as i64,
                        (i * 7 % 100) as i64,
                    ))
                    .await
            })
        })
        .collect();

    for result in futures::future::join_all(handles).await {
        assert!(matches!(result, Ok(Ok(_))));
    }

    let rebuilt_totals: Vec<u64> = system
        .maintenance
        .rebuild_all()
        .await
        .unwrap()
        .iter()
        .map(|counters| counters.total_scores)
        .collect();
    assert_eq!(rebuilt_totals, vec![30, 30, 30, 30]);

    for deck_size in deck_sizes {
        assert!(system
            .maintenance
            .verify_partition(deck_size as u32)
            .await
            .unwrap()
            .is_consistent());
    }
}
