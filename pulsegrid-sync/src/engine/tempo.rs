//! Tempo and phase tracking (phase-locked loop)
//!
//! A continuous estimator over the (bpm, t_last_beat) pair. Each canonical
//! event is compared against the nearest predicted beat boundary; the phase
//! is corrected by a fraction of the error, and the tempo is nudged much
//! more slowly. The BPM clamp is authoritative: after clamping, `beat_ms`
//! is recomputed from the clamped value.

use super::types::{CanonicalEvent, SLOTS_PER_BEAT};

const DEFAULT_PHASE_GAIN: f64 = 0.2;
const DEFAULT_TEMPO_GAIN: f64 = 0.001;
const MIN_BPM: f64 = 60.0;
const MAX_BPM: f64 = 200.0;

#[derive(Debug)]
pub struct TempoTracker {
    bpm: f64,
    beat_ms: f64,
    /// Server time of the last beat boundary; None until the first event
    t_last_beat: Option<f64>,
    phase_gain: f64,
    tempo_gain: f64,
}

impl TempoTracker {
    pub fn new(initial_bpm: f64) -> Self {
        Self {
            bpm: initial_bpm,
            beat_ms: 60_000.0 / initial_bpm,
            t_last_beat: None,
            phase_gain: DEFAULT_PHASE_GAIN,
            tempo_gain: DEFAULT_TEMPO_GAIN,
        }
    }

    /// Update tempo/phase from a canonical event.
    ///
    /// The first event only anchors the beat boundary.
    pub fn update(&mut self, event: &CanonicalEvent) {
        let t_e = event.t_server_ms;

        let t_last = match self.t_last_beat {
            Some(t) => t,
            None => {
                self.t_last_beat = Some(t_e);
                return;
            }
        };

        // Nearest predicted beat boundary
        let k = ((t_e - t_last) / self.beat_ms).round();
        let t_pred = t_last + k * self.beat_ms;
        let err = t_e - t_pred;

        // Phase correction
        self.t_last_beat = Some(t_last + self.phase_gain * err);

        // Tempo correction, only across beat boundaries
        if k != 0.0 {
            self.beat_ms += self.tempo_gain * err * k.signum();
            self.bpm = (60_000.0 / self.beat_ms).clamp(MIN_BPM, MAX_BPM);
            self.beat_ms = 60_000.0 / self.bpm;
        }
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn beat_ms(&self) -> f64 {
        self.beat_ms
    }

    pub fn t_last_beat(&self) -> Option<f64> {
        self.t_last_beat
    }

    pub fn phase_gain(&self) -> f64 {
        self.phase_gain
    }

    pub fn tempo_gain(&self) -> f64 {
        self.tempo_gain
    }

    /// Slot duration in milliseconds (1/32 beat)
    pub fn slot_ms(&self) -> f64 {
        self.beat_ms / SLOTS_PER_BEAT as f64
    }

    /// Next phrase start aligned to a beat boundary, strictly ahead of
    /// `t_now_ms`. Untracked state returns `t_now_ms` itself.
    pub fn next_phrase_start(&self, t_now_ms: f64) -> f64 {
        let t_last = match self.t_last_beat {
            Some(t) => t,
            None => return t_now_ms,
        };

        let slot_ms = self.slot_ms();
        let slot_idx_now = ((t_now_ms - t_last) / slot_ms).ceil() as i64;

        // Snap up to the next multiple of 32 slots (beat boundary)
        let next_beat_slot = (slot_idx_now.div_euclid(SLOTS_PER_BEAT as i64) + 1) * SLOTS_PER_BEAT as i64;

        t_last + next_beat_slot as f64 * slot_ms
    }
}
