//! PulseGrid Synchronizer (pulsegrid-sync) - Main entry point
//!
//! Fuses pulse events from clock-skewed clients into a shared beat grid and
//! serves 4-beat phrase forecasts over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pulsegrid_sync::api::server::{self, AppContext};
use pulsegrid_sync::config::Config;
use pulsegrid_sync::db;
use pulsegrid_sync::engine::{BootstrapPredictor, PredictionMode, SlotPriorModel};
use pulsegrid_sync::PredictionEngine;

/// Command-line arguments for pulsegrid-sync
#[derive(Parser, Debug)]
#[command(name = "pulsegrid-sync")]
#[command(about = "Pulse synchronization and phrase-prediction service for PulseGrid")]
#[command(version)]
struct Args {
    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "PULSEGRID_PORT")]
    port: Option<u16>,

    /// Path to TOML config file
    #[arg(short, long, env = "PULSEGRID_CONFIG")]
    config: Option<PathBuf>,

    /// Data folder for the SQLite database
    #[arg(short, long)]
    data_folder: Option<PathBuf>,

    /// Run without persistence even if the database is available
    #[arg(long)]
    no_database: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulsegrid_sync=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let config = Config::load(args.config.as_deref());
    let port = args.port.unwrap_or(config.port);

    info!("Starting PulseGrid Synchronizer on port {}", port);
    info!("Prediction mode: {}", config.mode.as_str());

    // Resolve the data folder: CLI > env > TOML > platform default
    let data_folder = pulsegrid_common::config::resolve_data_folder(
        args.data_folder.as_ref().and_then(|p| p.to_str()),
        "PULSEGRID_DATA_FOLDER",
    )
    .context("Failed to resolve data folder")?;

    // Open storage; the engine runs fine without it (best-effort persistence)
    let db_pool = if args.no_database {
        info!("Persistence disabled by --no-database");
        None
    } else {
        match open_database(&data_folder, &config).await {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("Running without persistence: {}", e);
                None
            }
        }
    };

    // Construct the engine
    let engine = Arc::new(PredictionEngine::new(
        config.initial_bpm,
        config.fusion_window_ms,
        config.mode,
    ));
    if config.enable_tracing {
        engine.enable_tracing(true);
    }

    // Bootstrap mode: attach the slot-prior predictor and seed it from
    // stored prediction records
    if config.mode == PredictionMode::Bootstrap {
        engine.set_bootstrap_predictor(BootstrapPredictor::new(SlotPriorModel::default()));

        if let Some(pool) = &db_pool {
            match db::predictions::get_recent_predictions(pool, config.prior_seed_limit).await {
                Ok(records) if !records.is_empty() => {
                    engine.seed_priors_from_records(&records);
                    info!("Seeded slot priors from {} stored records", records.len());
                }
                Ok(_) => info!("No stored records to seed slot priors from"),
                Err(e) => warn!("Failed to seed slot priors: {}", e),
            }
        }
    }
    info!("Prediction engine initialized");

    let ctx = AppContext { engine, db_pool };

    server::run(port, ctx, shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn open_database(data_folder: &std::path::Path, config: &Config) -> Result<sqlx::Pool<sqlx::Sqlite>> {
    tokio::fs::create_dir_all(data_folder)
        .await
        .with_context(|| format!("Failed to create data folder {:?}", data_folder))?;

    let db_path = config.database_path(Some(data_folder));
    let pool = db::open_pool(&db_path)
        .await
        .context("Failed to open database")?;
    db::init_database(&pool)
        .await
        .context("Failed to initialize database schema")?;

    Ok(pool)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
