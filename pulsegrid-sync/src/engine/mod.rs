//! Prediction engine
//!
//! Orchestrates the pulse ingestion pipeline (clock sync → event fusion →
//! tempo tracking → grid encoding → predictor update) and phrase
//! prediction. All sub-components live in one aggregate guarded by a single
//! mutex: ingestion and prediction are mutually exclusive, and `get_state()`
//! observes cross-component updates atomically. No I/O happens inside the
//! lock; persistence is the API layer's concern.

pub mod clock;
pub mod fusion;
pub mod grid;
pub mod predictor;
pub mod priors;
pub mod stats;
pub mod tempo;
pub mod types;

pub use clock::{ClockSync, DeviceClockSnapshot};
pub use fusion::EventFusion;
pub use grid::GridEncoder;
pub use predictor::DeterministicPredictor;
pub use priors::{BootstrapPredictor, PatternRecord, SlotPriorModel};
pub use tempo::TempoTracker;
pub use types::{
    CanonicalEvent, PhraseOutput, PredictionMode, PulseEvent, ServerEvent, PHRASE_BEATS,
    PHRASE_SLOTS, SLOTS_PER_BEAT,
};

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

/// Pipeline trace entries retained for diagnostics
const MAX_TRACES: usize = 100;

/// Canonical events included in a state snapshot
const SNAPSHOT_EVENT_LIMIT: usize = 20;

/// One diagnostic record of a pulse's trip through the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct PipelineTrace {
    pub server_time_ms: f64,
    pub device_id: String,
    pub t_server_ms: f64,
    pub finalized_canonical: bool,
    pub active_clusters: usize,
}

/// Serializable engine state snapshot for observability; never mutates state
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub mode: String,
    pub bpm: f64,
    pub beat_ms: f64,
    pub t_last_beat: Option<f64>,
    pub slot_ms: f64,
    pub num_canonical_events: usize,
    pub num_devices: usize,
    pub last_update_time: Option<f64>,
    pub clock_sync: HashMap<String, DeviceClockSnapshot>,
    pub event_fusion: FusionSnapshot,
    pub tempo_tracker: TempoSnapshot,
    pub grid_encoder: GridSnapshot,
    pub predictor: PredictorSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct FusionSnapshot {
    pub window_ms: f64,
    pub active_clusters: usize,
    pub recent_canonical_events: Vec<CanonicalEvent>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TempoSnapshot {
    pub bpm: f64,
    pub beat_ms: f64,
    pub t_last_beat: Option<f64>,
    pub slot_ms: f64,
    pub phase_gain: f64,
    pub tempo_gain: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GridSnapshot {
    pub history_beats: usize,
    pub history_slots: usize,
    pub hist_start_time: Option<f64>,
    pub hist_onset: Vec<f64>,
    pub hist_hold: Vec<f64>,
    pub hist_conf: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictorSnapshot {
    #[serde(rename = "type")]
    pub kind: String,
    pub threshold: f64,
    pub pattern_ema_length: usize,
    pub duration_patterns_count: usize,
}

/// Everything behind the engine mutex
struct EngineState {
    mode: PredictionMode,
    clock_sync: ClockSync,
    event_fusion: EventFusion,
    tempo_tracker: TempoTracker,
    grid_encoder: GridEncoder,
    predictor: DeterministicPredictor,
    bootstrap_predictor: Option<BootstrapPredictor>,
    last_update_time: Option<f64>,
    pipeline_traces: VecDeque<PipelineTrace>,
    trace_enabled: bool,
}

/// Pulse synchronization and phrase-prediction engine.
///
/// One long-lived instance per process, constructed once and shared by
/// handle into the request-handling layer; no ambient global state.
pub struct PredictionEngine {
    inner: Mutex<EngineState>,
}

impl PredictionEngine {
    pub fn new(initial_bpm: f64, window_ms: f64, mode: PredictionMode) -> Self {
        Self {
            inner: Mutex::new(EngineState {
                mode,
                clock_sync: ClockSync::new(),
                event_fusion: EventFusion::new(window_ms),
                tempo_tracker: TempoTracker::new(initial_bpm),
                grid_encoder: GridEncoder::default(),
                predictor: DeterministicPredictor::default(),
                bootstrap_predictor: None,
                last_update_time: None,
                pipeline_traces: VecDeque::new(),
                trace_enabled: false,
            }),
        }
    }

    /// Attach the bootstrap predictor (bootstrap mode only)
    pub fn set_bootstrap_predictor(&self, predictor: BootstrapPredictor) {
        let mut state = self.lock();
        state.bootstrap_predictor = Some(predictor);
    }

    pub fn enable_tracing(&self, enabled: bool) {
        let mut state = self.lock();
        state.trace_enabled = enabled;
    }

    /// Most recent pipeline traces, oldest first
    pub fn pipeline_traces(&self, limit: usize) -> Vec<PipelineTrace> {
        let state = self.lock();
        let skip = state.pipeline_traces.len().saturating_sub(limit);
        state.pipeline_traces.iter().skip(skip).cloned().collect()
    }

    pub fn mode(&self) -> PredictionMode {
        self.lock().mode
    }

    pub fn current_bpm(&self) -> f64 {
        self.lock().tempo_tracker.bpm()
    }

    /// Whether the attached bootstrap predictor has priors to answer with
    pub fn bootstrap_ready(&self) -> bool {
        let state = self.lock();
        state
            .bootstrap_predictor
            .as_ref()
            .map(|bp| bp.model().is_ready())
            .unwrap_or(false)
    }

    /// Ingest one clock calibration round trip for a device
    pub fn update_from_ping(&self, device_id: &str, t0_device: f64, t1_server: f64, t2_device: f64) {
        let mut state = self.lock();
        state
            .clock_sync
            .update_from_ping(device_id, t0_device, t1_server, t2_device);
    }

    /// Fold a batch of 32-slot patterns into the slot priors (bootstrap ingest)
    pub fn update_slot_priors(&self, patterns: &[Vec<i64>], durations: Option<&[Vec<i64>]>) {
        let mut state = self.lock();
        if let Some(bp) = state.bootstrap_predictor.as_mut() {
            bp.model_mut().update_from_patterns(patterns, durations);
        }
    }

    /// Seed the slot priors from stored prediction records (startup)
    pub fn seed_priors_from_records(&self, records: &[PatternRecord]) {
        let mut state = self.lock();
        if let Some(bp) = state.bootstrap_predictor.as_mut() {
            bp.model_mut().update_from_records(records);
        }
    }

    /// Run one pulse through the full ingestion pipeline.
    ///
    /// Returns the canonical event if this pulse finalized a cluster.
    pub fn process_pulse(&self, pulse: PulseEvent, server_time_ms: f64) -> Option<CanonicalEvent> {
        let mut state = self.lock();

        // 1. Clock sync: convert to server time
        let t_server_ms = state
            .clock_sync
            .convert_to_server_time(&pulse.device_id, pulse.t_device_ms);

        // 2. Build the server event
        let server_event = ServerEvent {
            t_server_ms,
            dur_ms: pulse.dur_ms,
            device_id: pulse.device_id.clone(),
            source_id: pulse.source_id,
            quality: pulse.meta,
        };

        // 3. Event fusion
        let canonical = state.event_fusion.add_event(server_event);

        if let Some(canonical) = &canonical {
            // 4. Tempo/phase update
            state.tempo_tracker.update(canonical);

            // 5. Grid encoding with the tempo-tracked window start
            let slot_ms = state.tempo_tracker.slot_ms();
            let hist_start = history_start(&state, server_time_ms);
            state.grid_encoder.add_event(canonical, slot_ms, hist_start);

            // 6. Predictor duration patterns
            let (hist_onset, hist_hold, _) = state.grid_encoder.history_arrays();
            state.predictor.update_from_history(&hist_onset, &hist_hold);

            debug!(
                t_server_ms = canonical.t_server_ms,
                conf = canonical.conf,
                "canonical event finalized"
            );
        }

        if state.trace_enabled {
            let trace = PipelineTrace {
                server_time_ms,
                device_id: pulse.device_id,
                t_server_ms,
                finalized_canonical: canonical.is_some(),
                active_clusters: state.event_fusion.active_cluster_count(),
            };
            if state.pipeline_traces.len() == MAX_TRACES {
                state.pipeline_traces.pop_front();
            }
            state.pipeline_traces.push_back(trace);
        }

        state.last_update_time = Some(server_time_ms);
        canonical
    }

    /// Predict the next 4-beat phrase.
    ///
    /// Returns `None` only when realtime prediction has never observed a
    /// beat; bootstrap mode always answers (all zeros when priors are
    /// empty).
    pub fn predict_phrase(&self, server_time_ms: f64, bpm_override: Option<f64>) -> Option<PhraseOutput> {
        let mut state = self.lock();

        match state.mode {
            PredictionMode::Bootstrap if state.bootstrap_predictor.is_some() => {
                Some(predict_bootstrap(&state, server_time_ms, bpm_override))
            }
            PredictionMode::Realtime => predict_realtime(&mut state, server_time_ms),
            // Legacy modes (and bootstrap without priors attached) fall back
            // to the realtime path
            _ => predict_realtime(&mut state, server_time_ms),
        }
    }

    /// Serializable snapshot of the whole pipeline; read-only
    pub fn get_state(&self) -> EngineSnapshot {
        let state = self.lock();

        let (hist_onset, hist_hold, hist_conf) = state.grid_encoder.history_arrays();

        EngineSnapshot {
            mode: state.mode.as_str().to_string(),
            bpm: state.tempo_tracker.bpm(),
            beat_ms: state.tempo_tracker.beat_ms(),
            t_last_beat: state.tempo_tracker.t_last_beat(),
            slot_ms: state.tempo_tracker.slot_ms(),
            num_canonical_events: state.event_fusion.canonical_event_count(),
            num_devices: state.clock_sync.device_count(),
            last_update_time: state.last_update_time,
            clock_sync: state.clock_sync.snapshot(),
            event_fusion: FusionSnapshot {
                window_ms: state.event_fusion.window_ms(),
                active_clusters: state.event_fusion.active_cluster_count(),
                recent_canonical_events: state.event_fusion.last_events(SNAPSHOT_EVENT_LIMIT),
            },
            tempo_tracker: TempoSnapshot {
                bpm: state.tempo_tracker.bpm(),
                beat_ms: state.tempo_tracker.beat_ms(),
                t_last_beat: state.tempo_tracker.t_last_beat(),
                slot_ms: state.tempo_tracker.slot_ms(),
                phase_gain: state.tempo_tracker.phase_gain(),
                tempo_gain: state.tempo_tracker.tempo_gain(),
            },
            grid_encoder: GridSnapshot {
                history_beats: state.grid_encoder.history_beats(),
                history_slots: state.grid_encoder.history_slots(),
                hist_start_time: state.grid_encoder.hist_start_time(),
                hist_onset,
                hist_hold,
                hist_conf,
            },
            predictor: PredictorSnapshot {
                kind: "deterministic".to_string(),
                threshold: state.predictor.threshold(),
                pattern_ema_length: state.predictor.pattern_ema_len(),
                duration_patterns_count: state.predictor.duration_pattern_count(),
            },
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        // A poisoned lock means a panic mid-update; recover the guard, the
        // aggregate state is still structurally valid
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Start of the grid history window for the current tempo state
fn history_start(state: &EngineState, t_now_ms: f64) -> f64 {
    let history_beats = state.grid_encoder.history_beats() as f64;
    match state.tempo_tracker.t_last_beat() {
        Some(t_last_beat) => t_last_beat - history_beats * state.tempo_tracker.beat_ms(),
        None => t_now_ms - history_beats * (60_000.0 / 120.0),
    }
}

fn predict_bootstrap(state: &EngineState, server_time_ms: f64, bpm_override: Option<f64>) -> PhraseOutput {
    let bootstrap = state
        .bootstrap_predictor
        .as_ref()
        .expect("bootstrap predictor attached");

    // A zero/negative/non-finite override would poison beat_ms and the
    // phrase start; ignore it and use the tracked tempo
    let bpm = bpm_override
        .filter(|b| b.is_finite() && *b > 0.0)
        .unwrap_or_else(|| state.tempo_tracker.bpm());
    let beat_ms = 60_000.0 / bpm;
    let slot_ms = beat_ms / SLOTS_PER_BEAT as f64;

    let (onset, dur_slots, confidence) = bootstrap.predict_phrase();

    // Phrase start: snap half a beat from now up to the next beat boundary
    let tentative = server_time_ms + beat_ms * 0.5;
    let beats_from_now = ((tentative - server_time_ms) / beat_ms).ceil();
    let phrase_start = server_time_ms + beats_from_now * beat_ms;

    PhraseOutput {
        phrase_start_server_ms: phrase_start,
        bpm,
        slot_ms,
        slots_per_beat: SLOTS_PER_BEAT,
        phrase_beats: PHRASE_BEATS,
        onset,
        dur_slots,
        confidence,
    }
}

fn predict_realtime(state: &mut EngineState, server_time_ms: f64) -> Option<PhraseOutput> {
    // No tempo lock yet: structured "not enough data" at the API boundary
    state.tempo_tracker.t_last_beat()?;

    let phrase_start = state.tempo_tracker.next_phrase_start(server_time_ms);
    let (hist_onset, hist_hold, hist_conf) = state.grid_encoder.history_arrays();

    let (mut onset, mut dur_slots) = state.predictor.predict(&hist_onset, &hist_hold, &hist_conf);

    // Confidence tiled from the last beat of observed history
    let mut confidence = vec![0.5; PHRASE_SLOTS];
    if hist_conf.len() >= SLOTS_PER_BEAT {
        let pattern_conf = &hist_conf[hist_conf.len() - SLOTS_PER_BEAT..];
        for (i, conf) in confidence.iter_mut().enumerate() {
            *conf = pattern_conf[i % SLOTS_PER_BEAT];
        }
    }

    apply_overlap_constraint(&mut onset, &mut dur_slots);

    Some(PhraseOutput {
        phrase_start_server_ms: phrase_start,
        bpm: state.tempo_tracker.bpm(),
        slot_ms: state.tempo_tracker.slot_ms(),
        slots_per_beat: SLOTS_PER_BEAT,
        phrase_beats: PHRASE_BEATS,
        onset,
        dur_slots,
        confidence,
    })
}

/// Drop any onset falling inside a previous onset's hold window so the
/// emitted phrase never holds two notes at once.
pub fn apply_overlap_constraint(onset: &mut [f64], dur_slots: &mut [u32]) {
    let n = onset.len();
    let mut hold = vec![false; n];

    for i in 0..n {
        if onset[i] > 0.5 {
            if !hold[i] {
                let dur = dur_slots[i].max(1) as usize;
                for slot in hold.iter_mut().take((i + dur).min(n)).skip(i) {
                    *slot = true;
                }
            } else {
                onset[i] = 0.0;
                dur_slots[i] = 0;
            }
        }
    }
}
