//! Incremental percentile ranking
//!
//! This module holds the counting data structure, the per-partition
//! aggregate and the pure engine that updates both with every new score.

pub mod engine;
pub mod partition;
pub mod percentile;
pub mod worse_than;

// Re-export commonly used types
pub use engine::{RankingEngine, RankingOutcome};
pub use partition::{PartitionCounters, StoredPartitionCounters};
pub use percentile::{percentile, percentile_of};
pub use worse_than::{MapInsertion, WorseThanMap};
