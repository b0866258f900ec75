//! Main entry point for the Pairs Ranking service
//!
//! Loads configuration, optionally seeds scores from a file, serves the
//! health and metrics endpoints and shuts down gracefully on SIGINT/SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use pairs_ranking::config::{validate_config, AppConfig};
use pairs_ranking::service::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Pairs Ranking Service - percentile ranking for card-matching game scores
#[derive(Parser)]
#[command(
    name = "pairs-ranking",
    version,
    about = "Incremental percentile ranking service for card-matching game scores",
    long_about = "Pairs Ranking records finished card-matching games and ranks every score \
                 against all earlier scores of the same deck size, keeping per-deck-size \
                 worse-than counters so each submission is ranked without rescanning history."
)]
struct Args {
    /// Configuration file path
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Perform health check and exit
    #[arg(long, help = "Probe a running instance's liveness endpoint and exit")]
    health_check: bool,

    /// Log level override
    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    /// Health port override
    #[arg(long, value_name = "PORT", help = "Override health and metrics server port")]
    health_port: Option<u16>,

    /// Seed file
    #[arg(
        long,
        value_name = "FILE",
        help = "JSON array of score submissions to record at startup"
    )]
    seed: Option<PathBuf>,

    /// Enable debug mode
    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    /// Dry run mode (validate config and exit)
    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Ask a running instance for `/alive` and report whether it answered 2xx
async fn perform_health_check(config: &AppConfig) -> Result<bool> {
    let url = format!("http://127.0.0.1:{}/alive", config.service.health_port);
    info!("Probing liveness at {}", url);
    probe_liveness(&url, Duration::from_secs(5)).await
}

async fn probe_liveness(url: &str, timeout: Duration) -> Result<bool> {
    let response = reqwest::Client::new()
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", url))?;

    Ok(response.status().is_success())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C) signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

fn display_startup_banner(config: &AppConfig) {
    info!("Pairs Ranking Service v{}", pairs_ranking::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!("   Health port: {}", config.service.health_port);
    info!(
        "   Deck sizes: {}..={}",
        config.ranking.min_deck_size, config.ranking.max_deck_size
    );
    info!(
        "   Conflict retries: {} ({}ms apart)",
        config.ranking.max_conflict_retries, config.ranking.conflict_retry_delay_ms
    );
    info!(
        "   Page size: {} (max {})",
        config.leaderboard.default_results_per_page, config.leaderboard.max_results_per_page
    );
}

/// Load configuration from file or environment, then apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path)?
    } else {
        AppConfig::from_env()?
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }

    if args.debug {
        config.service.log_level = "debug".to_string();
    }

    if let Some(health_port) = args.health_port {
        config.service.health_port = health_port;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if args.health_check {
        match perform_health_check(&config).await {
            Ok(true) => {
                println!("Health Check: alive");
                std::process::exit(0);
            }
            Ok(false) => {
                println!("Health Check: not alive");
                std::process::exit(1);
            }
            Err(e) => {
                println!("Health Check: unreachable ({:#})", e);
                std::process::exit(1);
            }
        }
    }

    if args.dry_run {
        info!("Configuration validation successful");
        display_startup_banner(&config);
        info!("Dry run completed - exiting without starting service");
        return Ok(());
    }

    display_startup_banner(&config);

    let app_state = match AppState::new(config.clone()) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(seed_path) = &args.seed {
        if let Err(e) = app_state.seed_from_file(seed_path).await {
            error!("Seeding failed: {:#}", e);
            std::process::exit(1);
        }
    }

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    info!("Pairs Ranking Service is running");
    info!("Press Ctrl+C to shutdown gracefully...");

    wait_for_shutdown_signal().await;

    info!("Shutdown signal received, beginning graceful shutdown...");

    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(())) => info!("Graceful shutdown completed successfully"),
        Ok(Err(e)) => warn!("Shutdown completed with errors: {}", e),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    info!("Pairs Ranking Service stopped");
    Ok(())
}
