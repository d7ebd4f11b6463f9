//! Offline slot-prior recompute tool
//!
//! Rebuilds the 32-slot priors from stored prediction records and prints a
//! summary, for checking what the bootstrap predictor would serve after a
//! restart.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use pulsegrid_sync::db;
use pulsegrid_sync::engine::{SlotPriorModel, SLOTS_PER_BEAT};

#[derive(Parser, Debug)]
#[command(name = "recompute-priors")]
#[command(about = "Recompute slot priors from stored prediction records")]
#[command(version)]
struct Args {
    /// Maximum number of records to process
    #[arg(long, default_value = "10000")]
    limit: i64,

    /// Path to the SQLite database file
    #[arg(long)]
    db_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if !args.db_path.exists() {
        bail!("Database not found at {:?}", args.db_path);
    }

    println!("Loading database: {:?}", args.db_path);
    let pool = db::open_pool(&args.db_path)
        .await
        .context("Failed to open database")?;

    println!("Loading up to {} recent predictions...", args.limit);
    let records = db::predictions::get_recent_predictions(&pool, args.limit)
        .await
        .context("Failed to load prediction records")?;

    if records.is_empty() {
        bail!("No prediction records found in database");
    }

    println!("Processing {} records...", records.len());
    let mut model = SlotPriorModel::default();
    model.update_from_records(&records);

    if !model.is_ready() {
        bail!("No usable patterns in the loaded records");
    }

    println!("Slot priors ({} samples):", model.sample_count());
    println!("  slot  p_onset  median_dur  confidence");
    for slot in 0..SLOTS_PER_BEAT {
        let (p_onset, median_dur, confidence) = model.prior(slot);
        println!(
            "  {:>4}  {:>7.3}  {:>10}  {:>10.3}",
            slot, p_onset, median_dur, confidence
        );
    }

    Ok(())
}
