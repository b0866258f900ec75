//! Service layer
//!
//! Submission coordination, leaderboard queries, maintenance, and the
//! application state that ties them to storage, metrics and health checks.

pub mod app;
pub mod health;
pub mod leaderboard;
pub mod locks;
pub mod maintenance;
pub mod sort;
pub mod submission;

pub use app::{AppState, SeedSummary, ServiceError};
pub use health::{HealthCheck, HealthStatus};
pub use leaderboard::LeaderboardQueryService;
pub use locks::{ExclusiveGuard, PartitionGuard, PartitionLocks};
pub use maintenance::{MaintenanceService, PartitionReport};
pub use sort::SortHistory;
pub use submission::{validate_submission, ScoreSubmissionCoordinator};
