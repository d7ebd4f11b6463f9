//! Core event and output types for the prediction pipeline

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Slots per beat (32nd-note resolution)
pub const SLOTS_PER_BEAT: usize = 32;

/// Beats per predicted phrase
pub const PHRASE_BEATS: usize = 4;

/// Slots per predicted phrase (4 beats x 32 slots)
pub const PHRASE_SLOTS: usize = SLOTS_PER_BEAT * PHRASE_BEATS;

/// Prediction strategy selection
///
/// `Deterministic`, `Tcn` and `Gru` are legacy placeholders kept for wire
/// compatibility; they dispatch to the realtime path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMode {
    /// Slot priors aggregated from stored pattern batches
    Bootstrap,
    /// Live event fusion + tempo tracking
    Realtime,
    Deterministic,
    Tcn,
    Gru,
}

impl PredictionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionMode::Bootstrap => "bootstrap",
            PredictionMode::Realtime => "realtime",
            PredictionMode::Deterministic => "deterministic",
            PredictionMode::Tcn => "tcn",
            PredictionMode::Gru => "gru",
        }
    }
}

/// Raw pulse event as reported by a device, in device-local time
#[derive(Debug, Clone)]
pub struct PulseEvent {
    pub device_id: String,
    pub source_id: Option<String>,
    pub t_device_ms: f64,
    pub dur_ms: f64,
    pub meta: HashMap<String, Value>,
}

/// Pulse event normalized to server time by clock sync
#[derive(Debug, Clone)]
pub struct ServerEvent {
    pub t_server_ms: f64,
    pub dur_ms: f64,
    pub device_id: String,
    pub source_id: Option<String>,
    pub quality: HashMap<String, Value>,
}

impl ServerEvent {
    /// Contributor tag: `device_id:source_id`, or just `device_id`
    pub fn contributor_tag(&self) -> String {
        match &self.source_id {
            Some(source) => format!("{}:{}", self.device_id, source),
            None => self.device_id.clone(),
        }
    }
}

/// Fused canonical event representing one physical beat
///
/// Immutable once emitted by fusion; retained in a bounded history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEvent {
    /// Median of contributor timestamps
    pub t_server_ms: f64,
    /// Median of contributor durations
    pub dur_ms: f64,
    /// Number of contributing events
    pub conf: usize,
    /// Population stddev of contributor timestamps (0 for a single member)
    pub spread_ms: f64,
    /// `device_id[:source_id]` per contributor, in insertion order
    pub contributors: Vec<String>,
}

/// Predicted 4-beat phrase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhraseOutput {
    pub phrase_start_server_ms: f64,
    pub bpm: f64,
    pub slot_ms: f64,
    pub slots_per_beat: usize,
    pub phrase_beats: usize,
    /// 0/1 onset flags, one per slot
    pub onset: Vec<f64>,
    /// Held-note length in slots per onset (0 where no onset)
    pub dur_slots: Vec<u32>,
    /// Per-slot confidence in [0, 1]
    pub confidence: Vec<f64>,
}
