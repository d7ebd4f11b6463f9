//! Source registry and pulse timestamp storage

use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

/// One pulse timestamp row: (source, bpm at ingest, pulse time, duration)
#[derive(Debug, Clone)]
pub struct PulseTimestampRow {
    pub source_id: Uuid,
    pub bpm: f64,
    pub pulse_time: DateTime<Utc>,
    pub duration_ms: i64,
}

/// Look up a source by its client key, creating it on first sight
pub async fn get_or_create_source(pool: &Pool<Sqlite>, hashed_ip: &str) -> Result<Uuid> {
    let existing = sqlx::query("SELECT source_id FROM sources WHERE hashed_ip = ?")
        .bind(hashed_ip)
        .fetch_optional(pool)
        .await?;

    if let Some(row) = existing {
        let id: String = row.get("source_id");
        if let Ok(uuid) = Uuid::parse_str(&id) {
            return Ok(uuid);
        }
    }

    let source_id = Uuid::new_v4();
    sqlx::query("INSERT OR IGNORE INTO sources (source_id, hashed_ip) VALUES (?, ?)")
        .bind(source_id.to_string())
        .bind(hashed_ip)
        .execute(pool)
        .await?;

    Ok(source_id)
}

/// Batch-insert pulse timestamps
pub async fn insert_pulse_timestamps(pool: &Pool<Sqlite>, pulses: &[PulseTimestampRow]) -> Result<()> {
    for pulse in pulses {
        sqlx::query(
            "INSERT INTO pulse_timestamps (source_id, bpm, pulse_time, duration_ms)
             VALUES (?, ?, ?, ?)",
        )
        .bind(pulse.source_id.to_string())
        .bind(pulse.bpm)
        .bind(pulse.pulse_time.to_rfc3339())
        .bind(pulse.duration_ms)
        .execute(pool)
        .await?;
    }

    Ok(())
}
