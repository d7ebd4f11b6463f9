//! Database layer integration tests
//!
//! Runs against a real SQLite file in a temp directory: schema creation,
//! the source registry, and the prediction record round trip that feeds
//! prior seeding at startup.

use pulsegrid_sync::db;
use pulsegrid_sync::db::predictions::PredictionData;
use pulsegrid_sync::db::sources::PulseTimestampRow;
use pulsegrid_sync::engine::SlotPriorModel;
use sqlx::Row;
use tempfile::TempDir;

async fn test_pool() -> (TempDir, sqlx::Pool<sqlx::Sqlite>) {
    let dir = TempDir::new().unwrap();
    let pool = db::init::open_pool(&dir.path().join("test.db")).await.unwrap();
    db::init::init_database(&pool).await.unwrap();
    (dir, pool)
}

#[tokio::test]
async fn test_init_database_is_idempotent() {
    let (_dir, pool) = test_pool().await;
    db::init::init_database(&pool).await.unwrap();

    let tables: Vec<String> =
        sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(&pool)
            .await
            .unwrap()
            .into_iter()
            .map(|row| row.get("name"))
            .collect();

    assert!(tables.contains(&"predictions".to_string()));
    assert!(tables.contains(&"sources".to_string()));
    assert!(tables.contains(&"pulse_timestamps".to_string()));
}

#[tokio::test]
async fn test_get_or_create_source_is_stable_per_key() {
    let (_dir, pool) = test_pool().await;

    let first = db::sources::get_or_create_source(&pool, "client-a").await.unwrap();
    let second = db::sources::get_or_create_source(&pool, "client-a").await.unwrap();
    assert_eq!(first, second);

    let other = db::sources::get_or_create_source(&pool, "client-b").await.unwrap();
    assert_ne!(first, other);
}

#[tokio::test]
async fn test_pulse_timestamps_round_trip() {
    let (_dir, pool) = test_pool().await;

    let source_id = db::sources::get_or_create_source(&pool, "client-a").await.unwrap();
    let rows = vec![
        PulseTimestampRow {
            source_id,
            bpm: 120.0,
            pulse_time: chrono::Utc::now(),
            duration_ms: 80,
        },
        PulseTimestampRow {
            source_id,
            bpm: 121.0,
            pulse_time: chrono::Utc::now(),
            duration_ms: 90,
        },
    ];
    db::sources::insert_pulse_timestamps(&pool, &rows).await.unwrap();

    let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM pulse_timestamps WHERE source_id = ?")
        .bind(source_id.to_string())
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("n");
    assert_eq!(count, 2);
}

#[tokio::test]
async fn test_prediction_records_seed_slot_priors() {
    let (_dir, pool) = test_pool().await;

    let mut pattern = vec![0i64; 32];
    pattern[0] = 1;
    pattern[5] = 1;

    let data = PredictionData {
        current_bpm: Some(120.0),
        recent_pulse_patterns: vec![pattern.clone(), pattern],
        ..Default::default()
    };

    let timestamp = chrono::Utc::now().to_rfc3339();
    let id = db::predictions::insert_prediction(&pool, &timestamp, &timestamp, &data, Some("client-a"))
        .await
        .unwrap();
    assert!(id > 0);

    // Read back the stored JSON text columns and rebuild the priors
    let records = db::predictions::get_recent_predictions(&pool, 100).await.unwrap();
    assert_eq!(records.len(), 1);

    let mut model = SlotPriorModel::default();
    model.update_from_records(&records);

    assert!(model.is_ready());
    assert_eq!(model.sample_count(), 2);
    assert_eq!(model.prior(0).0, 1.0);
    assert_eq!(model.prior(5).0, 1.0);
    assert_eq!(model.prior(1).0, 0.0);
}

#[tokio::test]
async fn test_update_prediction_attaches_phrase() {
    let (_dir, pool) = test_pool().await;

    let timestamp = chrono::Utc::now().to_rfc3339();
    let id = db::predictions::insert_prediction(
        &pool,
        &timestamp,
        &timestamp,
        &PredictionData::default(),
        None,
    )
    .await
    .unwrap();

    let onset = vec![1.0; 4];
    let dur_slots = vec![2u32; 4];
    db::predictions::update_prediction(&pool, id, &onset, &dur_slots).await.unwrap();

    let stored: Option<String> = sqlx::query("SELECT current_prediction FROM predictions WHERE id = ?")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap()
        .get("current_prediction");

    let value: serde_json::Value = serde_json::from_str(&stored.unwrap()).unwrap();
    assert_eq!(value["onset"].as_array().unwrap().len(), 4);
    assert_eq!(value["dur_slots"][0], 2);
    assert!(value["updated_at"].is_string());
}

#[tokio::test]
async fn test_recent_predictions_respect_limit() {
    let (_dir, pool) = test_pool().await;

    for i in 0..5 {
        let timestamp = format!("2026-08-30T00:00:0{}Z", i);
        db::predictions::insert_prediction(
            &pool,
            &timestamp,
            &timestamp,
            &PredictionData::default(),
            None,
        )
        .await
        .unwrap();
    }

    let records = db::predictions::get_recent_predictions(&pool, 3).await.unwrap();
    assert_eq!(records.len(), 3);
}
