//! Main application configuration
//!
//! This module defines the primary configuration structures for the ranking
//! service, including environment variable and TOML file loading and validation.

use crate::config::leaderboard::LeaderboardSettings;
use crate::config::ranking::RankingSettings;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub ranking: RankingSettings,
    pub leaderboard: LeaderboardSettings,
}

/// Service-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check and metrics endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "pairs-ranking".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

/// Parse an environment variable into `target` if it is set
fn override_from_env<T: std::str::FromStr>(name: &str, target: &mut T) -> Result<()> {
    if let Ok(raw) = env::var(name) {
        *target = raw
            .parse()
            .map_err(|_| anyhow!("Invalid {} value: {}", name, raw))?;
    }
    Ok(())
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        override_from_env("SERVICE_NAME", &mut config.service.name)?;
        override_from_env("LOG_LEVEL", &mut config.service.log_level)?;
        override_from_env("HEALTH_PORT", &mut config.service.health_port)?;
        override_from_env(
            "SHUTDOWN_TIMEOUT_SECONDS",
            &mut config.service.shutdown_timeout_seconds,
        )?;

        // Ranking settings
        override_from_env("MIN_DECK_SIZE", &mut config.ranking.min_deck_size)?;
        override_from_env("MAX_DECK_SIZE", &mut config.ranking.max_deck_size)?;
        override_from_env(
            "MAX_INITIALS_LENGTH",
            &mut config.ranking.max_initials_length,
        )?;
        override_from_env(
            "MAX_CONFLICT_RETRIES",
            &mut config.ranking.max_conflict_retries,
        )?;
        override_from_env(
            "CONFLICT_RETRY_DELAY_MS",
            &mut config.ranking.conflict_retry_delay_ms,
        )?;

        // Leaderboard settings
        override_from_env(
            "DEFAULT_RESULTS_PER_PAGE",
            &mut config.leaderboard.default_results_per_page,
        )?;
        override_from_env(
            "MAX_RESULTS_PER_PAGE",
            &mut config.leaderboard.max_results_per_page,
        )?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate TOML configuration text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate ranking settings
    let ranking = &config.ranking;
    if ranking.min_deck_size == 0 || ranking.min_deck_size % 2 != 0 {
        return Err(anyhow!(
            "Minimum deck size must be a positive even number, got {}",
            ranking.min_deck_size
        ));
    }
    if ranking.max_deck_size < ranking.min_deck_size {
        return Err(anyhow!(
            "Maximum deck size {} is below minimum {}",
            ranking.max_deck_size,
            ranking.min_deck_size
        ));
    }
    if ranking.max_initials_length == 0 {
        return Err(anyhow!("Max initials length must be greater than 0"));
    }
    if ranking.max_conflict_retries == 0 {
        return Err(anyhow!("Max conflict retries must be greater than 0"));
    }

    // Validate leaderboard settings
    let leaderboard = &config.leaderboard;
    if leaderboard.max_results_per_page == 0 {
        return Err(anyhow!("Max results per page must be greater than 0"));
    }
    if leaderboard.default_results_per_page == 0
        || leaderboard.default_results_per_page > leaderboard.max_results_per_page
    {
        return Err(anyhow!(
            "Default results per page must be between 1 and {}",
            leaderboard.max_results_per_page
        ));
    }

    Ok(())
}
