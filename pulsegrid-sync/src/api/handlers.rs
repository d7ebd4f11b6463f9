//! HTTP request handlers
//!
//! The engine prefers silent degradation over raising: storage failures are
//! logged and never abort ingestion or prediction, and a realtime engine
//! with no tempo lock answers with a structured error body rather than a
//! 5xx.

use crate::api::server::AppContext;
use crate::db;
use crate::db::predictions::PredictionData;
use crate::db::sources::PulseTimestampRow;
use crate::engine::{PipelineTrace, PredictionMode, PulseEvent};
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use pulsegrid_common::api::{
    CanonicalEventBody, ErrorResponse, PingRequest, PingResponse, PredictPhraseRequest,
    PredictPhraseResponse, PulseRequest, PulseResponse,
};
use pulsegrid_common::time::server_now_ms;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
    mode: String,
    bootstrap_ready: bool,
    engine_state: crate::engine::EngineSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct TracesParams {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TracesResponse {
    status: String,
    traces: Vec<PipelineTrace>,
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "synchronizer".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Clock Calibration
// ============================================================================

/// POST /ping - Clock calibration exchange
///
/// A request carrying the full (t0, t1, t2) triple completes one calibration
/// sample; a bare t0 request just fetches the server time for the next leg.
pub async fn ping(State(ctx): State<AppContext>, Json(req): Json<PingRequest>) -> Json<PingResponse> {
    let server_time_ms = server_now_ms();

    if let (Some(t1), Some(t2)) = (req.t1_server_ms, req.t2_device_ms) {
        ctx.engine
            .update_from_ping(&req.device_id, req.t0_device_ms, t1, t2);
        debug!(device_id = %req.device_id, "clock calibration sample ingested");
    }

    Json(PingResponse {
        status: "success".to_string(),
        server_time_ms,
    })
}

// ============================================================================
// Pulse Submission
// ============================================================================

/// POST /pulse - Submit one pulse event from a device
pub async fn pulse(State(ctx): State<AppContext>, Json(req): Json<PulseRequest>) -> Json<PulseResponse> {
    let server_time_ms = server_now_ms();

    let event = PulseEvent {
        device_id: req.device_id.clone(),
        source_id: req.source_id,
        t_device_ms: req.t_device_ms,
        dur_ms: req.dur_ms,
        meta: req.meta,
    };

    let canonical = ctx.engine.process_pulse(event, server_time_ms);

    // Best-effort persistence of the finalized event
    if let (Some(pool), Some(canonical)) = (&ctx.db_pool, &canonical) {
        if let Err(e) = store_pulse(pool, &req.device_id, ctx.engine.current_bpm(), server_time_ms, canonical.dur_ms).await {
            warn!("Failed to store pulse: {}", e);
        }
    }

    Json(PulseResponse {
        status: "success".to_string(),
        server_time_ms,
        canonical_event: canonical.map(|c| CanonicalEventBody {
            t_server_ms: c.t_server_ms,
            dur_ms: c.dur_ms,
            conf: c.conf,
            spread_ms: c.spread_ms,
        }),
    })
}

async fn store_pulse(
    pool: &sqlx::Pool<sqlx::Sqlite>,
    device_id: &str,
    bpm: f64,
    server_time_ms: f64,
    dur_ms: f64,
) -> crate::error::Result<()> {
    let source_id = db::sources::get_or_create_source(pool, device_id).await?;
    let pulse_time = epoch_ms_to_datetime(server_time_ms);

    db::sources::insert_pulse_timestamps(
        pool,
        &[PulseTimestampRow {
            source_id,
            bpm,
            pulse_time,
            duration_ms: dur_ms as i64,
        }],
    )
    .await
}

// ============================================================================
// Ingest + Predict
// ============================================================================

/// POST /predict_phrase - Ingest batched client data and predict the next
/// 4-beat phrase
pub async fn predict_phrase(
    State(ctx): State<AppContext>,
    body: Option<Json<PredictPhraseRequest>>,
) -> Result<Json<PredictPhraseResponse>, Json<ErrorResponse>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let server_time_ms = server_now_ms();

    debug!(sequence_id = ?req.sequence_id, "predict_phrase request");

    // 1. Best-effort ingest of the batched payload
    let prediction_id = match &ctx.db_pool {
        Some(pool) => match ingest_batched_data(pool, &req, server_time_ms).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to ingest batched data: {}", e);
                None
            }
        },
        None => None,
    };

    // 2. Update predictor state
    match ctx.engine.mode() {
        PredictionMode::Bootstrap => {
            if !req.recent_pulse_patterns.is_empty() {
                debug!(
                    "Updating slot priors from {} patterns",
                    req.recent_pulse_patterns.len()
                );
                let durations = if req.recent_pulse_durations_slots.is_empty() {
                    None
                } else {
                    Some(req.recent_pulse_durations_slots.as_slice())
                };
                ctx.engine
                    .update_slot_priors(&req.recent_pulse_patterns, durations);
            }
        }
        PredictionMode::Realtime => {
            let device_id = req.device_id.clone().unwrap_or_else(|| "unknown".to_string());
            for (i, &t_pulse) in req.recent_pulse_timestamps.iter().enumerate() {
                let dur_ms = req.recent_pulse_durations.get(i).copied().unwrap_or(100.0);
                let event = PulseEvent {
                    device_id: device_id.clone(),
                    source_id: None,
                    t_device_ms: t_pulse,
                    dur_ms,
                    meta: Default::default(),
                };
                ctx.engine.process_pulse(event, server_time_ms);
            }
        }
        _ => {}
    }

    // 3. Predict
    let phrase = match ctx.engine.predict_phrase(server_time_ms, req.current_bpm) {
        Some(phrase) => phrase,
        None => {
            return Err(Json(ErrorResponse::new("Not enough data for prediction")));
        }
    };

    // Best-effort: attach the emitted phrase to the stored record
    if let (Some(pool), Some(id)) = (&ctx.db_pool, prediction_id) {
        if let Err(e) = db::predictions::update_prediction(pool, id, &phrase.onset, &phrase.dur_slots).await {
            warn!("Failed to update prediction {}: {}", id, e);
        }
    }

    Ok(Json(PredictPhraseResponse {
        status: "success".to_string(),
        phrase_start_server_ms: phrase.phrase_start_server_ms,
        bpm: phrase.bpm,
        slot_ms: phrase.slot_ms,
        slots_per_beat: phrase.slots_per_beat,
        phrase_beats: phrase.phrase_beats,
        onset: phrase.onset,
        dur_slots: phrase.dur_slots,
        confidence: phrase.confidence,
    }))
}

async fn ingest_batched_data(
    pool: &sqlx::Pool<sqlx::Sqlite>,
    req: &PredictPhraseRequest,
    server_time_ms: f64,
) -> crate::error::Result<i64> {
    let device_id = req.device_id.as_deref().unwrap_or("unknown");

    // Register the submitting source
    db::sources::get_or_create_source(pool, device_id).await?;

    let data = PredictionData {
        current_bpm: req.current_bpm,
        bpm_history: req.bpm_history.clone(),
        recent_pulse_patterns: req.recent_pulse_patterns.clone(),
        recent_pulse_durations_slots: req.recent_pulse_durations_slots.clone(),
        recent_pulse_timestamps: req.recent_pulse_timestamps.clone(),
        recent_pulse_durations_ms: req.recent_pulse_durations.clone(),
    };

    let timestamp = epoch_ms_to_datetime(server_time_ms).to_rfc3339();
    db::predictions::insert_prediction(pool, &timestamp, &timestamp, &data, Some(device_id)).await
}

// ============================================================================
// Diagnostics
// ============================================================================

/// GET /status - Engine state snapshot
pub async fn status(State(ctx): State<AppContext>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "success".to_string(),
        mode: ctx.engine.mode().as_str().to_string(),
        bootstrap_ready: ctx.engine.bootstrap_ready(),
        engine_state: ctx.engine.get_state(),
    })
}

/// GET /traces?limit=N - Recent pipeline traces
pub async fn traces(
    State(ctx): State<AppContext>,
    Query(params): Query<TracesParams>,
) -> Json<TracesResponse> {
    let limit = params.limit.unwrap_or(10);
    Json(TracesResponse {
        status: "success".to_string(),
        traces: ctx.engine.pipeline_traces(limit),
    })
}

fn epoch_ms_to_datetime(epoch_ms: f64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(epoch_ms as i64).unwrap_or_else(Utc::now)
}
