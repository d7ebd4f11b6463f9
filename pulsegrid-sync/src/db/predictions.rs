//! Prediction record storage
//!
//! Slot-indexed arrays are stored as JSON text columns; readers decode them
//! back when seeding the slot priors.

use crate::engine::PatternRecord;
use crate::error::Result;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};

/// Payload of one stored prediction request
#[derive(Debug, Clone, Default)]
pub struct PredictionData {
    pub current_bpm: Option<f64>,
    pub bpm_history: Vec<f64>,
    pub recent_pulse_patterns: Vec<Vec<i64>>,
    pub recent_pulse_durations_slots: Vec<Vec<i64>>,
    pub recent_pulse_timestamps: Vec<f64>,
    pub recent_pulse_durations_ms: Vec<f64>,
}

/// Insert a prediction record; returns the new row id
pub async fn insert_prediction(
    pool: &Pool<Sqlite>,
    client_timestamp: &str,
    server_timestamp: &str,
    data: &PredictionData,
    hashed_ip: Option<&str>,
) -> Result<i64> {
    let result = sqlx::query(
        "INSERT INTO predictions (
            client_timestamp, server_timestamp, current_bpm,
            bpm_history, recent_pulse_patterns, recent_pulse_durations,
            recent_pulse_timestamps, recent_pulse_durations_ms, hashed_ip
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(client_timestamp)
    .bind(server_timestamp)
    .bind(data.current_bpm)
    .bind(serde_json::to_string(&data.bpm_history)?)
    .bind(serde_json::to_string(&data.recent_pulse_patterns)?)
    .bind(serde_json::to_string(&data.recent_pulse_durations_slots)?)
    .bind(serde_json::to_string(&data.recent_pulse_timestamps)?)
    .bind(serde_json::to_string(&data.recent_pulse_durations_ms)?)
    .bind(hashed_ip)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Attach the emitted phrase to a stored prediction record
pub async fn update_prediction(
    pool: &Pool<Sqlite>,
    id: i64,
    onset: &[f64],
    dur_slots: &[u32],
) -> Result<()> {
    let prediction = serde_json::json!({
        "onset": onset,
        "dur_slots": dur_slots,
        "updated_at": Utc::now().to_rfc3339(),
    });

    sqlx::query("UPDATE predictions SET current_prediction = ? WHERE id = ?")
        .bind(prediction.to_string())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Most recent prediction records as pattern/duration pairs for prior seeding
pub async fn get_recent_predictions(pool: &Pool<Sqlite>, limit: i64) -> Result<Vec<PatternRecord>> {
    let rows = sqlx::query(
        "SELECT recent_pulse_patterns, recent_pulse_durations
         FROM predictions
         ORDER BY created_at DESC
         LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| PatternRecord {
            pattern: row
                .get::<Option<String>, _>("recent_pulse_patterns")
                .map(serde_json::Value::String),
            durations: row
                .get::<Option<String>, _>("recent_pulse_durations")
                .map(serde_json::Value::String),
        })
        .collect())
}
