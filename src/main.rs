//! Fieldwatch - Field Climate Risk Evaluation Service
//!
//! Runs the fleet scheduler as a background task next to a thin HTTP shell.
//!
//! # Usage
//!
//! ```bash
//! # Run with fieldwatch.toml from the working directory (or defaults)
//! cargo run --release
//!
//! # Override the bind address and store location
//! cargo run --release -- --addr 127.0.0.1:9000 --data-dir /var/lib/fieldwatch
//!
//! # One-time root history bucket cleanup
//! cargo run --release -- cleanup-history
//! ```
//!
//! # Environment Variables
//!
//! - `FIELDWATCH_CONFIG`: Path to the TOML config file
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use fieldwatch::api::{create_app, ApiState};
use fieldwatch::config::Settings;
use fieldwatch::evaluator::FieldEvaluator;
use fieldwatch::scheduler::FleetScheduler;
use fieldwatch::scoring::{load_threshold, AnomalyScorer, DenseAutoencoder, FeatureScaler};
use fieldwatch::solar::NasaPowerClient;
use fieldwatch::storage::{RecordStore, SledStore};
use fieldwatch::maintenance;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "fieldwatch")]
#[command(about = "Field climate risk evaluation service")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config file (default: ./fieldwatch.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the HTTP bind address (default: "0.0.0.0:8000")
    #[arg(short, long)]
    addr: Option<String>,

    /// Override the record store directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Delete the root history bucket of every field that also has a
    /// live-status entry. One-time migration cleanup - irreversible!
    CleanupHistory,
}

// ============================================================================
// Entry Point
// ============================================================================

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = CliArgs::parse();

    let mut settings =
        Settings::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(addr) = args.addr {
        settings.server.addr = addr;
    }
    if let Some(data_dir) = args.data_dir {
        settings.store.data_dir = data_dir;
    }

    match args.command {
        Some(SubCommand::CleanupHistory) => run_cleanup(&settings).await,
        None => run_service(settings).await,
    }
}

// ============================================================================
// Maintenance Mode
// ============================================================================

async fn run_cleanup(settings: &Settings) -> Result<()> {
    let store = SledStore::open(&settings.store.data_dir)
        .context("Failed to open record store")?;

    let summary = maintenance::cleanup_history(&store)
        .await
        .context("History cleanup failed")?;

    info!(
        buckets = summary.buckets_deleted,
        entries = summary.entries_deleted,
        "History cleanup complete"
    );
    Ok(())
}

// ============================================================================
// Service Mode
// ============================================================================

async fn run_service(settings: Settings) -> Result<()> {
    info!("Fieldwatch starting");

    // Scoring artifacts are loaded exactly once; the threshold is
    // process-wide immutable configuration.
    let scaler = FeatureScaler::from_artifact(&settings.model.scaler_path)
        .context("Failed to load feature scaler")?;
    let model = DenseAutoencoder::from_artifact(&settings.model.weights_path)
        .context("Failed to load autoencoder weights")?;
    let threshold = load_threshold(&settings.model.threshold_path)
        .context("Failed to load anomaly threshold")?;
    let scorer = Arc::new(
        AnomalyScorer::new(scaler, Arc::new(model), threshold)
            .context("Failed to construct anomaly scorer")?,
    );
    info!(threshold, "Scoring model loaded");

    let store: Arc<dyn RecordStore> = Arc::new(
        SledStore::open(&settings.store.data_dir).context("Failed to open record store")?,
    );
    info!(path = %settings.store.data_dir.display(), "Record store opened");

    let evaluator = FieldEvaluator::new(
        Arc::clone(&store),
        Arc::new(NasaPowerClient::new()),
        scorer,
        settings.solar.default_coords(),
    );
    let scheduler = FleetScheduler::new(
        evaluator,
        Arc::clone(&store),
        Duration::from_secs(settings.scheduler.pass_interval_secs),
    );
    let scheduler_state = scheduler.state();

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let mut task_set: JoinSet<Result<&'static str>> = JoinSet::new();

    let scheduler_cancel = cancel_token.clone();
    task_set.spawn(async move {
        scheduler.run(scheduler_cancel).await;
        Ok("FleetScheduler")
    });

    let app = create_app(ApiState {
        scheduler: scheduler_state,
    });
    let listener = tokio::net::TcpListener::bind(&settings.server.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.server.addr))?;
    info!("HTTP server listening on {}", settings.server.addr);

    let http_cancel = cancel_token.clone();
    task_set.spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                http_cancel.cancelled().await;
            })
            .await
            .map(|()| "HttpServer")
            .map_err(|e| anyhow::anyhow!("HTTP server error: {e}"))
    });

    while let Some(result) = task_set.join_next().await {
        match result {
            Ok(Ok(name)) => info!("[{name}] Task completed"),
            Ok(Err(e)) => {
                error!("Task failed: {e:#}");
                cancel_token.cancel();
            }
            Err(e) => {
                error!("Task panicked: {e}");
                cancel_token.cancel();
            }
        }
    }

    info!("Fieldwatch shutdown complete");
    Ok(())
}
