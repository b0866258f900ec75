//! Leaderboard queries
//!
//! Ranks scores against their partition's current counters and serves one
//! page. With a sort history the whole filtered set is ranked and sorted
//! before the page is cut; without one, pages follow ascending id. Queries are
//! read-only and never take partition locks.

use crate::config::LeaderboardSettings;
use crate::error::{ranking_error, RankingError, Result};
use crate::metrics::MetricsCollector;
use crate::ranking::partition::PartitionCounters;
use crate::service::sort::SortHistory;
use crate::storage::{PartitionCounterStore, ScoreRepository};
use crate::types::{
    DeckSize, LeaderboardPage, LeaderboardQuery, ScoreMetric, ScoreRecord, ScoreWithPercentiles,
};
use crate::utils::elapsed_ms;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Check paging bounds and build the sort history for a query
pub fn validate_query(
    query: &LeaderboardQuery,
    settings: &LeaderboardSettings,
) -> std::result::Result<SortHistory, RankingError> {
    if query.page_number < 1 {
        return Err(RankingError::validation("page number starts at 1"));
    }
    if query.results_per_page == 0 || query.results_per_page > settings.max_results_per_page {
        return Err(RankingError::validation(format!(
            "results per page must be between 1 and {}, got {}",
            settings.max_results_per_page, query.results_per_page
        )));
    }
    SortHistory::from_columns(query.sort_by_column_history.clone())
}

/// Rank every record against its partition.
///
/// Records whose partition is missing, or whose value the partition never
/// saw, get `None` percentiles.
pub fn attach_percentiles(
    records: Vec<ScoreRecord>,
    partitions: &HashMap<DeckSize, PartitionCounters>,
) -> Vec<ScoreWithPercentiles> {
    records
        .into_iter()
        .map(|score| {
            let (mismatch_percentile, game_time_percentile) =
                match partitions.get(&score.deck_size) {
                    Some(counters) => (
                        counters.percentile_for(ScoreMetric::Mismatches, &score),
                        counters.percentile_for(ScoreMetric::GameTime, &score),
                    ),
                    None => (None, None),
                };

            ScoreWithPercentiles {
                score,
                mismatch_percentile,
                game_time_percentile,
            }
        })
        .collect()
}

/// Warn about served rows missing a percentile and return how many there were
pub fn count_unranked(entries: &[ScoreWithPercentiles]) -> usize {
    let mut unranked = 0;
    for entry in entries {
        if entry.mismatch_percentile.is_none() || entry.game_time_percentile.is_none() {
            unranked += 1;
            warn!(
                "Score {} (deck size {}) could not be fully ranked against its partition",
                entry.score.id, entry.score.deck_size
            );
        }
    }
    unranked
}

/// Serves ranked, sorted leaderboard pages
pub struct LeaderboardQueryService {
    scores: Arc<dyn ScoreRepository>,
    counters: Arc<dyn PartitionCounterStore>,
    settings: LeaderboardSettings,
    metrics: Option<Arc<MetricsCollector>>,
}

impl LeaderboardQueryService {
    pub fn new(
        scores: Arc<dyn ScoreRepository>,
        counters: Arc<dyn PartitionCounterStore>,
        settings: LeaderboardSettings,
    ) -> Self {
        Self {
            scores,
            counters,
            settings,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Query for the first page with the configured page size
    pub fn default_query(&self, deck_sizes_filter: Vec<DeckSize>) -> LeaderboardQuery {
        LeaderboardQuery {
            page_number: 1,
            results_per_page: self.settings.default_results_per_page,
            deck_sizes_filter,
            sort_by_column_history: Vec::new(),
        }
    }

    /// Fetch, rank and sort one leaderboard page
    pub async fn query(&self, query: &LeaderboardQuery) -> Result<LeaderboardPage> {
        let start_time = Instant::now();
        let result = self.query_inner(query).await;

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok((_, unranked)) => metrics.record_query("ok", start_time.elapsed(), *unranked),
                Err(e) => {
                    let outcome = match ranking_error(e) {
                        Some(RankingError::Validation { .. }) => "rejected",
                        _ => "error",
                    };
                    metrics.record_query(outcome, start_time.elapsed(), 0);
                }
            }
        }

        result.map(|(page, _)| page)
    }

    async fn query_inner(&self, query: &LeaderboardQuery) -> Result<(LeaderboardPage, usize)> {
        let start_time = Instant::now();
        let history = validate_query(query, &self.settings)?;
        let offset = query.offset();
        let limit = query.results_per_page as usize;

        // Sorting can move any matching row onto any page, so a sorted query
        // ranks the whole filtered set before cutting the window.
        let (entries, total_matching) = if history.is_empty() {
            let page = self
                .scores
                .page(&query.deck_sizes_filter, offset, limit)
                .await?;
            let partitions = self.load_partitions(&page.records).await?;
            (
                attach_percentiles(page.records, &partitions),
                page.total_matching,
            )
        } else {
            let records = self.scores.matching(&query.deck_sizes_filter).await?;
            let total_matching = records.len() as u64;
            let partitions = self.load_partitions(&records).await?;

            let mut ranked = attach_percentiles(records, &partitions);
            history.sort(&mut ranked);
            (
                ranked.into_iter().skip(offset).take(limit).collect(),
                total_matching,
            )
        };
        let unranked = count_unranked(&entries);

        debug!(
            "Leaderboard page {} ({} rows of {} matching, decks {:?}) served in {:.2}ms",
            query.page_number,
            entries.len(),
            total_matching,
            query.deck_sizes_filter,
            elapsed_ms(start_time)
        );

        Ok((
            LeaderboardPage {
                entries,
                total_matching,
                page_number: query.page_number,
                results_per_page: query.results_per_page,
            },
            unranked,
        ))
    }

    /// Parse the counters of every deck size present in `records`
    async fn load_partitions(
        &self,
        records: &[ScoreRecord],
    ) -> Result<HashMap<DeckSize, PartitionCounters>> {
        let deck_sizes: Vec<DeckSize> = records
            .iter()
            .map(|record| record.deck_size)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if deck_sizes.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = self.counters.load_many(&deck_sizes).await?;
        let mut partitions = HashMap::with_capacity(rows.len());
        for (deck_size, row) in rows {
            partitions.insert(deck_size, PartitionCounters::from_stored(&row)?);
        }
        Ok(partitions)
    }
}
