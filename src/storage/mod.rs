//! Storage interfaces for score records and partition counters
//!
//! Both tables live in an external storage engine; the traits here are the
//! seam, with in-memory implementations for single-process use and tests.

pub mod counters;
pub mod scores;

// Re-export commonly used types
pub use counters::{CasOutcome, InMemoryCounterStore, PartitionCounterStore};
pub use scores::{InMemoryScoreRepository, ScorePage, ScoreRepository};
