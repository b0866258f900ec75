//! Configuration management for the ranking service
//!
//! This module handles configuration loading from environment variables or a
//! TOML file, validation, and default values.

pub mod app;
pub mod leaderboard;
pub mod ranking;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, ServiceSettings};
pub use leaderboard::{LeaderboardSettings, MAX_SORT_COLUMNS};
pub use ranking::RankingSettings;
