//! Score submission
//!
//! Validates a finished game, persists it, and folds it into its partition's
//! counters. Updates of one partition are serialized in-process by
//! [`PartitionLocks`] and across processes by the counter store's
//! compare-and-swap, retried a bounded number of times.

use crate::config::RankingSettings;
use crate::error::{ranking_error, RankingError, Result};
use crate::metrics::MetricsCollector;
use crate::ranking::engine::{RankingEngine, RankingOutcome};
use crate::ranking::partition::PartitionCounters;
use crate::service::locks::PartitionLocks;
use crate::storage::{CasOutcome, PartitionCounterStore, ScoreRepository};
use crate::types::{NewScore, ScoreRecord, ScoreSubmission, SubmissionReceipt};
use crate::utils::{current_timestamp, elapsed_ms};
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Check a raw submission and convert it into a storable score.
///
/// Nothing is persisted for a submission that fails here.
pub fn validate_submission(
    submission: &ScoreSubmission,
    settings: &RankingSettings,
) -> std::result::Result<NewScore, RankingError> {
    let deck_size = submission.deck_size;
    if deck_size < settings.min_deck_size as i64 || deck_size > settings.max_deck_size as i64 {
        return Err(RankingError::validation(format!(
            "deck size {} outside [{}, {}]",
            deck_size, settings.min_deck_size, settings.max_deck_size
        )));
    }
    if deck_size % 2 != 0 {
        return Err(RankingError::validation(format!(
            "deck size {} is odd",
            deck_size
        )));
    }

    for (name, value) in [
        ("mismatches", submission.mismatches),
        ("game_time_units", submission.game_time_units),
        ("pairs", submission.pairs),
    ] {
        if value < 0 {
            return Err(RankingError::validation(format!(
                "{} cannot be negative, got {}",
                name, value
            )));
        }
    }
    if submission.pairs > deck_size / 2 {
        return Err(RankingError::validation(format!(
            "{} pairs do not fit in a deck of {}",
            submission.pairs, deck_size
        )));
    }

    let initials = submission.initials.trim();
    if initials.is_empty() {
        return Err(RankingError::validation("initials are required"));
    }
    if initials.chars().count() > settings.max_initials_length {
        return Err(RankingError::validation(format!(
            "initials longer than {} characters",
            settings.max_initials_length
        )));
    }
    if submission.user_id.trim().is_empty() {
        return Err(RankingError::validation("user id is required"));
    }

    Ok(NewScore {
        deck_size: deck_size as u32,
        mismatches: submission.mismatches as u64,
        game_time_units: submission.game_time_units as u64,
        pairs: submission.pairs as u32,
        initials: initials.to_string(),
        user_id: submission.user_id.clone(),
        color: submission.color.clone(),
        pixel_avatar: submission.pixel_avatar.clone(),
    })
}

/// Orchestrates persisting a score and ranking it within its partition
pub struct ScoreSubmissionCoordinator {
    scores: Arc<dyn ScoreRepository>,
    counters: Arc<dyn PartitionCounterStore>,
    locks: Arc<PartitionLocks>,
    engine: RankingEngine,
    settings: RankingSettings,
    metrics: Option<Arc<MetricsCollector>>,
}

impl ScoreSubmissionCoordinator {
    pub fn new(
        scores: Arc<dyn ScoreRepository>,
        counters: Arc<dyn PartitionCounterStore>,
        settings: RankingSettings,
    ) -> Self {
        Self {
            scores,
            counters,
            locks: Arc::new(PartitionLocks::new()),
            engine: RankingEngine::new(),
            settings,
            metrics: None,
        }
    }

    /// Share partition locks with other writers of the same stores
    pub fn with_locks(mut self, locks: Arc<PartitionLocks>) -> Self {
        self.locks = locks;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &RankingSettings {
        &self.settings
    }

    /// Persist and rank one finished game
    pub async fn submit(&self, submission: ScoreSubmission) -> Result<SubmissionReceipt> {
        let start_time = Instant::now();
        let result = self.submit_inner(submission).await;

        if let Some(metrics) = &self.metrics {
            let outcome = match &result {
                Ok(_) => "accepted",
                Err(e) => match ranking_error(e) {
                    Some(RankingError::Validation { .. }) => "rejected",
                    Some(RankingError::ConcurrencyConflict { .. }) => "conflict",
                    Some(RankingError::CorruptPartitionData { .. }) => "corrupt",
                    _ => "error",
                },
            };
            metrics.record_submission(outcome, start_time.elapsed());
        }

        result
    }

    async fn submit_inner(&self, submission: ScoreSubmission) -> Result<SubmissionReceipt> {
        let start_time = Instant::now();

        let score = validate_submission(&submission, &self.settings).map_err(|e| {
            warn!("Rejected score submission from '{}': {}", submission.user_id, e);
            e
        })?;
        let deck_size = score.deck_size;

        let _partition_guard = self.locks.acquire(deck_size).await?;

        let record = self
            .scores
            .insert(score)
            .await
            .context("Failed to persist score")?;
        debug!(
            "Persisted score {} for deck size {} (mismatches: {}, time: {})",
            record.id, deck_size, record.mismatches, record.game_time_units
        );

        let outcome = self.update_partition(&record).await.map_err(|e| {
            error!(
                "Score {} persisted but partition {} was not updated: {}",
                record.id, deck_size, e
            );
            e
        })?;

        info!(
            "Score {} ranked - deck: {}, mismatch percentile: {}, time percentile: {}, partition total: {}, time: {:.2}ms",
            record.id,
            deck_size,
            outcome.mismatch_percentile,
            outcome.game_time_percentile,
            outcome.counters.total_scores,
            elapsed_ms(start_time)
        );

        Ok(SubmissionReceipt {
            score_id: record.id,
            deck_size,
            mismatch_percentile: outcome.mismatch_percentile,
            game_time_percentile: outcome.game_time_percentile,
        })
    }

    /// Read, update and compare-and-swap the partition counters for `score`
    async fn update_partition(&self, score: &ScoreRecord) -> Result<RankingOutcome> {
        let deck_size = score.deck_size;
        let mut conflicts = 0u32;

        loop {
            let stored = self.counters.load(deck_size).await?;
            let current = match &stored {
                Some(row) => Some(PartitionCounters::from_stored(row)?),
                None => None,
            };

            let outcome = self.engine.submit(current.as_ref(), score)?;

            let now = current_timestamp();
            let expected_version = stored.as_ref().map(|row| row.version);
            let created_at = stored.as_ref().map_or(now, |row| row.created_at);
            let row = outcome.counters.to_stored(
                expected_version.map_or(1, |v| v + 1),
                created_at,
                now,
            )?;

            match self.counters.compare_and_swap(expected_version, row).await? {
                CasOutcome::Applied { version } => {
                    debug!(
                        "Partition {} counters written at version {}",
                        deck_size, version
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.update_partition(&outcome.counters);
                    }
                    return Ok(outcome);
                }
                CasOutcome::Conflict { current_version } => {
                    conflicts += 1;
                    if let Some(metrics) = &self.metrics {
                        metrics.record_write_conflict(deck_size);
                    }
                    warn!(
                        "Partition {} changed underneath score {} (expected {:?}, found {:?}), attempt {}/{}",
                        deck_size,
                        score.id,
                        expected_version,
                        current_version,
                        conflicts,
                        self.settings.max_conflict_retries + 1
                    );

                    if conflicts > self.settings.max_conflict_retries {
                        return Err(RankingError::ConcurrencyConflict {
                            deck_size,
                            attempts: conflicts,
                        }
                        .into());
                    }
                    tokio::time::sleep(self.settings.conflict_retry_delay()).await;
                }
            }
        }
    }
}
