//! Metrics and monitoring
//!
//! Prometheus collectors for submissions, queries and partition sizes, plus
//! the axum server exposing them alongside health checks.

pub mod collector;
pub mod health;

pub use collector::{
    MetricsCollector, MetricsTimer, PartitionMetrics, QueryMetrics, ServiceMetrics,
    SubmissionMetrics,
};
pub use health::{HealthServer, HealthServerConfig};
