//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the ranking service: submission
//! and query throughput and latency, write-race conflicts, and the size of every
//! partition's counters.

use crate::ranking::partition::PartitionCounters;
use crate::types::{DeckSize, ScoreMetric};
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the ranking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Score submission metrics
    submission_metrics: SubmissionMetrics,

    /// Leaderboard query metrics
    query_metrics: QueryMetrics,

    /// Per-partition counter metrics
    partition_metrics: PartitionMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Score submission metrics
#[derive(Clone)]
pub struct SubmissionMetrics {
    /// Submissions by outcome (accepted, rejected, conflict, corrupt, error)
    pub submissions_total: IntCounterVec,

    /// End-to-end submission time
    pub submission_duration: Histogram,

    /// Lost compare-and-swap races, by deck size
    pub write_conflicts_total: IntCounterVec,

    /// Offline partition rebuilds, by deck size
    pub rebuilds_total: IntCounterVec,
}

/// Leaderboard query metrics
#[derive(Clone)]
pub struct QueryMetrics {
    /// Queries by outcome (ok, rejected, error)
    pub queries_total: IntCounterVec,

    /// End-to-end query time
    pub query_duration: Histogram,

    /// Leaderboard entries returned without a percentile
    pub unranked_entries_total: IntCounter,
}

/// Per-partition counter metrics
#[derive(Clone)]
pub struct PartitionMetrics {
    /// Scores recorded per deck size
    pub total_scores: IntGaugeVec,

    /// Distinct values held in each worse-than map
    pub map_entries: IntGaugeVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let submission_metrics = SubmissionMetrics::new(&registry)?;
        let query_metrics = QueryMetrics::new(&registry)?;
        let partition_metrics = PartitionMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            submission_metrics,
            query_metrics,
            partition_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn submission(&self) -> &SubmissionMetrics {
        &self.submission_metrics
    }

    pub fn query(&self) -> &QueryMetrics {
        &self.query_metrics
    }

    pub fn partition(&self) -> &PartitionMetrics {
        &self.partition_metrics
    }

    /// Record a finished submission
    pub fn record_submission(&self, outcome: &str, duration: Duration) {
        self.submission_metrics
            .submissions_total
            .with_label_values(&[outcome])
            .inc();
        self.submission_metrics
            .submission_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a lost compare-and-swap race
    pub fn record_write_conflict(&self, deck_size: DeckSize) {
        let deck_label = deck_size.to_string();
        self.submission_metrics
            .write_conflicts_total
            .with_label_values(&[deck_label.as_str()])
            .inc();
    }

    /// Record an offline rebuild of a partition
    pub fn record_rebuild(&self, deck_size: DeckSize) {
        let deck_label = deck_size.to_string();
        self.submission_metrics
            .rebuilds_total
            .with_label_values(&[deck_label.as_str()])
            .inc();
    }

    /// Record a finished leaderboard query
    pub fn record_query(&self, outcome: &str, duration: Duration, unranked_entries: usize) {
        self.query_metrics
            .queries_total
            .with_label_values(&[outcome])
            .inc();
        self.query_metrics
            .query_duration
            .observe(duration.as_secs_f64());
        self.query_metrics
            .unranked_entries_total
            .inc_by(unranked_entries as u64);
    }

    /// Publish the current size of a partition's counters
    pub fn update_partition(&self, counters: &PartitionCounters) {
        let deck_label = counters.deck_size.to_string();

        self.partition_metrics
            .total_scores
            .with_label_values(&[deck_label.as_str()])
            .set(counters.total_scores as i64);

        for metric in ScoreMetric::ALL {
            let metric_label = metric.to_string();
            self.partition_metrics
                .map_entries
                .with_label_values(&[deck_label.as_str(), metric_label.as_str()])
                .set(counters.map_for(metric).len() as i64);
        }
    }

    /// Forget every partition gauge (after an administrative clear)
    pub fn reset_partitions(&self) {
        self.partition_metrics.total_scores.reset();
        self.partition_metrics.map_entries.reset();
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Update uptime from the service start time
    pub fn update_uptime(&self, started_at: Instant) {
        self.service_metrics
            .uptime_seconds
            .set(started_at.elapsed().as_secs() as i64);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("pairs_ranking_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "pairs_ranking_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("pairs_ranking_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl SubmissionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let submissions_total = IntCounterVec::new(
            Opts::new(
                "pairs_ranking_submissions_total",
                "Score submissions by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(submissions_total.clone()))?;

        let submission_duration = Histogram::with_opts(
            HistogramOpts::new(
                "pairs_ranking_submission_duration_seconds",
                "Time to persist and rank a score",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(submission_duration.clone()))?;

        let write_conflicts_total = IntCounterVec::new(
            Opts::new(
                "pairs_ranking_write_conflicts_total",
                "Partition counter writes that lost a compare-and-swap race",
            ),
            &["deck_size"],
        )?;
        registry.register(Box::new(write_conflicts_total.clone()))?;

        let rebuilds_total = IntCounterVec::new(
            Opts::new(
                "pairs_ranking_partition_rebuilds_total",
                "Partitions recomputed from the full score table",
            ),
            &["deck_size"],
        )?;
        registry.register(Box::new(rebuilds_total.clone()))?;

        Ok(Self {
            submissions_total,
            submission_duration,
            write_conflicts_total,
            rebuilds_total,
        })
    }
}

impl QueryMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let queries_total = IntCounterVec::new(
            Opts::new(
                "pairs_ranking_leaderboard_queries_total",
                "Leaderboard queries by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(queries_total.clone()))?;

        let query_duration = Histogram::with_opts(
            HistogramOpts::new(
                "pairs_ranking_leaderboard_query_duration_seconds",
                "Time to fetch, rank and sort a leaderboard page",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(query_duration.clone()))?;

        let unranked_entries_total = IntCounter::new(
            "pairs_ranking_unranked_entries_total",
            "Leaderboard entries returned without a percentile",
        )?;
        registry.register(Box::new(unranked_entries_total.clone()))?;

        Ok(Self {
            queries_total,
            query_duration,
            unranked_entries_total,
        })
    }
}

impl PartitionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let total_scores = IntGaugeVec::new(
            Opts::new(
                "pairs_ranking_partition_scores",
                "Scores recorded per deck size",
            ),
            &["deck_size"],
        )?;
        registry.register(Box::new(total_scores.clone()))?;

        let map_entries = IntGaugeVec::new(
            Opts::new(
                "pairs_ranking_worse_than_map_entries",
                "Distinct values held in a partition's worse-than map",
            ),
            &["deck_size", "metric"],
        )?;
        registry.register(Box::new(map_entries.clone()))?;

        Ok(Self {
            total_scores,
            map_entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::worse_than::WorseThanMap;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let _service = collector.service();
        let _submission = collector.submission();
        let _query = collector.query();
        let _partition = collector.partition();
    }

    #[test]
    fn test_submission_recording() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_submission("accepted", Duration::from_millis(3));
        collector.record_submission("accepted", Duration::from_millis(4));
        collector.record_write_conflict(12);

        assert_eq!(
            collector
                .submission()
                .submissions_total
                .with_label_values(&["accepted"])
                .get(),
            2
        );
        assert_eq!(
            collector
                .submission()
                .write_conflicts_total
                .with_label_values(&["12"])
                .get(),
            1
        );
    }

    #[test]
    fn test_partition_gauges() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let counters = PartitionCounters {
            deck_size: 16,
            total_scores: 4,
            worse_than_mismatches: WorseThanMap::from_values([1, 1, 2, 3]),
            worse_than_game_time: WorseThanMap::from_values([10, 20, 30, 40]),
        };

        collector.update_partition(&counters);

        let partition = collector.partition();
        assert_eq!(partition.total_scores.with_label_values(&["16"]).get(), 4);
        assert_eq!(
            partition
                .map_entries
                .with_label_values(&["16", "mismatches"])
                .get(),
            3
        );
        assert_eq!(
            partition
                .map_entries
                .with_label_values(&["16", "game_time"])
                .get(),
            4
        );
    }

    #[test]
    fn test_render_contains_registered_metrics() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        collector.record_query("ok", Duration::from_millis(1), 0);

        let text = collector.render().unwrap();
        assert!(text.contains("pairs_ranking_leaderboard_queries_total"));
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.elapsed();

        assert!(duration >= Duration::from_millis(10));

        let final_duration = timer.stop();
        assert!(final_duration >= Duration::from_millis(10));
    }
}
