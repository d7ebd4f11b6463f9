//! Database initialization
//!
//! Opens the SQLite pool (creating the file if missing) and ensures the
//! schema exists.

use crate::error::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Open the SQLite connection pool, creating the database file if needed
pub async fn open_pool(db_path: &Path) -> Result<Pool<Sqlite>> {
    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Some(Duration::from_secs(60)))
        .connect(&db_url)
        .await?;

    info!("Connected to database: {:?}", db_path);
    Ok(pool)
}

/// Create tables and indexes if they do not exist
pub async fn init_database(pool: &Pool<Sqlite>) -> Result<()> {
    info!("Initializing database schema");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS predictions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            client_timestamp TEXT NOT NULL,
            server_timestamp TEXT NOT NULL,
            current_bpm REAL,
            bpm_history TEXT,
            recent_pulse_patterns TEXT,
            recent_pulse_durations TEXT,
            recent_pulse_timestamps TEXT,
            recent_pulse_durations_ms TEXT,
            current_prediction TEXT,
            hashed_ip TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_predictions_created_at
         ON predictions(created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_predictions_hashed_ip
         ON predictions(hashed_ip)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sources (
            source_id TEXT PRIMARY KEY,
            hashed_ip TEXT UNIQUE NOT NULL,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS pulse_timestamps (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id TEXT NOT NULL,
            bpm REAL,
            pulse_time TEXT NOT NULL,
            duration_ms INTEGER,
            FOREIGN KEY (source_id) REFERENCES sources(source_id)
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pulse_timestamps_source
         ON pulse_timestamps(source_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
