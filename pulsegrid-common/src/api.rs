//! Shared API request/response types
//!
//! Wire types exchanged between pulse clients and the synchronizer service.
//! Field names follow the client convention (camelCase for the batched
//! prediction payload, snake_case for device-level submissions).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// POST /predict_phrase request body (ingest + predict)
///
/// All fields are optional; an empty body is a plain prediction request.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PredictPhraseRequest {
    /// 32-slot onset patterns observed by the client (bootstrap ingest)
    #[serde(rename = "recentPulsePatterns", default)]
    pub recent_pulse_patterns: Vec<Vec<i64>>,

    /// 32-slot duration arrays matching `recent_pulse_patterns`
    #[serde(rename = "recentPulseDurationsSlots", default)]
    pub recent_pulse_durations_slots: Vec<Vec<i64>>,

    /// Client's current BPM estimate (bootstrap phrase-start override)
    #[serde(rename = "currentBPM", default)]
    pub current_bpm: Option<f64>,

    /// Recent BPM history (persisted, not used for prediction)
    #[serde(rename = "bpmHistory", default)]
    pub bpm_history: Vec<f64>,

    /// Raw device-time pulse timestamps in ms (realtime ingest)
    #[serde(rename = "recentPulseTimestamps", default)]
    pub recent_pulse_timestamps: Vec<f64>,

    /// Pulse durations in ms matching `recent_pulse_timestamps`
    #[serde(rename = "recentPulseDurations", default)]
    pub recent_pulse_durations: Vec<f64>,

    #[serde(default)]
    pub device_id: Option<String>,

    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub sequence_id: Option<i64>,
}

/// POST /predict_phrase success response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictPhraseResponse {
    pub status: String,
    pub phrase_start_server_ms: f64,
    pub bpm: f64,
    pub slot_ms: f64,
    pub slots_per_beat: usize,
    pub phrase_beats: usize,
    pub onset: Vec<f64>,
    pub dur_slots: Vec<u32>,
    pub confidence: Vec<f64>,
}

/// POST /pulse request body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PulseRequest {
    pub device_id: String,
    #[serde(default)]
    pub source_id: Option<String>,
    pub t_device_ms: f64,
    #[serde(default = "default_dur_ms")]
    pub dur_ms: f64,
    #[serde(default)]
    pub meta: HashMap<String, Value>,
}

fn default_dur_ms() -> f64 {
    100.0
}

/// Canonical event as reported back to the submitting client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEventBody {
    pub t_server_ms: f64,
    pub dur_ms: f64,
    pub conf: usize,
    pub spread_ms: f64,
}

/// POST /pulse response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseResponse {
    pub status: String,
    pub server_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_event: Option<CanonicalEventBody>,
}

/// POST /ping request body (clock calibration)
///
/// Two-phase exchange: the first request carries only `t0_device_ms` and the
/// client records the returned `server_time_ms` as t1. The follow-up request
/// carries the full (t0, t1, t2) triple, which completes one calibration
/// sample.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PingRequest {
    pub device_id: String,
    pub t0_device_ms: f64,
    #[serde(default)]
    pub t1_server_ms: Option<f64>,
    #[serde(default)]
    pub t2_device_ms: Option<f64>,
}

/// POST /ping response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub server_time_ms: f64,
}

/// Error response body shared by all endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}
