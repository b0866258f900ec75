//! Main application state and service coordination
//!
//! `AppState` wires the storage backends, the submission coordinator, the
//! leaderboard and maintenance services, metrics, and the health server.

use crate::config::AppConfig;
use crate::error::{ranking_error, RankingError, Result};
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::service::health::HealthCheck;
use crate::service::leaderboard::LeaderboardQueryService;
use crate::service::locks::PartitionLocks;
use crate::service::maintenance::MaintenanceService;
use crate::service::submission::ScoreSubmissionCoordinator;
use crate::storage::{
    InMemoryCounterStore, InMemoryScoreRepository, PartitionCounterStore, ScoreRepository,
};
use crate::types::ScoreSubmission;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Outcome of feeding a batch of submissions through the coordinator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub accepted: usize,
    pub rejected: usize,
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,

    scores: Arc<dyn ScoreRepository>,
    counters: Arc<dyn PartitionCounterStore>,

    submissions: Arc<ScoreSubmissionCoordinator>,
    leaderboard: Arc<LeaderboardQueryService>,
    maintenance: Arc<MaintenanceService>,

    metrics: Arc<MetricsCollector>,
    health_server: Mutex<Option<Arc<HealthServer>>>,
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    started_at: Instant,
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application backed by in-memory storage
    pub fn new(config: AppConfig) -> std::result::Result<Self, ServiceError> {
        Self::with_stores(
            config,
            Arc::new(InMemoryScoreRepository::new()),
            Arc::new(InMemoryCounterStore::new()),
        )
    }

    /// Initialize the application over the given storage backends
    pub fn with_stores(
        config: AppConfig,
        scores: Arc<dyn ScoreRepository>,
        counters: Arc<dyn PartitionCounterStore>,
    ) -> std::result::Result<Self, ServiceError> {
        info!("Initializing {} service", config.service.name);

        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let locks = Arc::new(PartitionLocks::new());

        let submissions = Arc::new(
            ScoreSubmissionCoordinator::new(
                scores.clone(),
                counters.clone(),
                config.ranking.clone(),
            )
            .with_locks(locks.clone())
            .with_metrics(metrics.clone()),
        );

        let leaderboard = Arc::new(
            LeaderboardQueryService::new(
                scores.clone(),
                counters.clone(),
                config.leaderboard.clone(),
            )
            .with_metrics(metrics.clone()),
        );

        let maintenance = Arc::new(
            MaintenanceService::new(scores.clone(), counters.clone(), locks)
                .with_max_attempts(config.ranking.max_conflict_retries + 1)
                .with_metrics(metrics.clone()),
        );

        Ok(Self {
            config,
            scores,
            counters,
            submissions,
            leaderboard,
            maintenance,
            metrics,
            health_server: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            started_at: Instant::now(),
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Start the health server and background tasks
    pub async fn start(self: &Arc<Self>) -> std::result::Result<(), ServiceError> {
        info!("Starting {} service", self.config.service.name);

        *self.is_running.write().await = true;

        self.start_health_server().await;
        self.start_background_tasks().await;

        info!("Service started successfully");
        Ok(())
    }

    /// Stop the health server and background tasks
    pub async fn shutdown(&self) -> std::result::Result<(), ServiceError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);

        *self.is_running.write().await = false;

        if let Some(server) = self.health_server.lock().await.take() {
            if let Err(e) = server.stop().await {
                warn!("Failed to stop health server: {}", e);
            }
        }

        self.stop_background_tasks().await;

        let total_scores =
            self.scores
                .total_count()
                .await
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;
        let partitions = self.counters.partition_count().await.unwrap_or(0);

        info!(
            "Final statistics: {} scores across {} partitions",
            total_scores, partitions
        );
        info!("Service shutdown completed");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn scores(&self) -> Arc<dyn ScoreRepository> {
        self.scores.clone()
    }

    pub fn counters(&self) -> Arc<dyn PartitionCounterStore> {
        self.counters.clone()
    }

    pub fn submissions(&self) -> Arc<ScoreSubmissionCoordinator> {
        self.submissions.clone()
    }

    pub fn leaderboard(&self) -> Arc<LeaderboardQueryService> {
        self.leaderboard.clone()
    }

    pub fn maintenance(&self) -> Arc<MaintenanceService> {
        self.maintenance.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Submit every entry in order.
    ///
    /// Rejected submissions are logged and skipped; any other failure aborts
    /// the batch.
    pub async fn seed(&self, submissions: Vec<ScoreSubmission>) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();

        for (index, submission) in submissions.into_iter().enumerate() {
            match self.submissions.submit(submission).await {
                Ok(_) => summary.accepted += 1,
                Err(e) => match ranking_error(&e) {
                    Some(RankingError::Validation { .. }) => {
                        warn!("Skipping seed entry {}: {}", index, e);
                        summary.rejected += 1;
                    }
                    _ => return Err(e.context(format!("seed entry {} failed", index))),
                },
            }
        }

        info!(
            "Seeded {} scores ({} rejected)",
            summary.accepted, summary.rejected
        );
        Ok(summary)
    }

    /// Load a JSON array of submissions and seed them
    pub async fn seed_from_file(&self, path: &Path) -> Result<SeedSummary> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let submissions: Vec<ScoreSubmission> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse seed file {}", path.display()))?;

        info!(
            "Loaded {} seed submissions from {}",
            submissions.len(),
            path.display()
        );
        self.seed(submissions).await
    }

    async fn start_health_server(self: &Arc<Self>) {
        let health_config = HealthServerConfig {
            port: self.config.service.health_port,
            host: "0.0.0.0".to_string(),
        };
        let server = Arc::new(
            HealthServer::new(health_config, self.metrics.clone()).with_app_state(self.clone()),
        );
        *self.health_server.lock().await = Some(server.clone());

        let handle = tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("Health server failed: {}", e);
            } else {
                info!("Health server task completed");
            }
        });
        self.background_tasks.lock().await.push(handle);

        // Give the listener a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;
        info!(
            "Health server started on port {}",
            self.config.service.health_port
        );
    }

    async fn start_background_tasks(self: &Arc<Self>) {
        info!("Starting health metrics task (30s interval)...");

        // Weak so the task never keeps the state alive after shutdown
        let state = Arc::downgrade(self);
        let is_running = self.is_running.clone();

        let health_metrics_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));

            while *is_running.read().await {
                interval.tick().await;

                let Some(state) = state.upgrade() else {
                    break;
                };
                match HealthCheck::check(&state).await {
                    Ok(health) => {
                        state.metrics.update_uptime(state.started_at);
                        state.metrics.update_health_status(health.status.as_gauge());
                        for check in &health.checks {
                            state.metrics.update_component_health(
                                &check.name,
                                check.status == crate::service::HealthStatus::Healthy,
                            );
                        }
                        debug!(
                            "Health {}: {} scores across {} partitions",
                            health.status, health.stats.total_scores, health.stats.partitions
                        );
                    }
                    Err(e) => warn!("Health metrics update failed: {}", e),
                }
            }

            info!("Health metrics task stopped");
        });

        self.background_tasks.lock().await.push(health_metrics_task);
    }

    async fn stop_background_tasks(&self) {
        let tasks: Vec<JoinHandle<()>> = self.background_tasks.lock().await.drain(..).collect();
        let task_count = tasks.len();
        if task_count == 0 {
            return;
        }

        info!("Stopping {} background tasks...", task_count);
        for task in tasks {
            task.abort();
        }
        info!("All {} background tasks stopped", task_count);
    }
}
