//! Rolling slot-grid history
//!
//! Canonical events are quantized onto parallel onset/hold/confidence
//! arrays covering `history_beats` beats at 32 slots each. Events that map
//! outside the window (late-arriving or stale) are silently dropped.

use super::types::{CanonicalEvent, SLOTS_PER_BEAT};

/// Beats of history retained
pub const DEFAULT_HISTORY_BEATS: usize = 8;

#[derive(Debug)]
pub struct GridEncoder {
    history_beats: usize,
    history_slots: usize,
    hist_onset: Vec<f64>,
    hist_hold: Vec<f64>,
    hist_conf: Vec<f64>,
    hist_start_time: Option<f64>,
}

impl GridEncoder {
    pub fn new(history_beats: usize) -> Self {
        let history_slots = history_beats * SLOTS_PER_BEAT;
        Self {
            history_beats,
            history_slots,
            hist_onset: vec![0.0; history_slots],
            hist_hold: vec![0.0; history_slots],
            hist_conf: vec![0.0; history_slots],
            hist_start_time: None,
        }
    }

    /// Map a canonical event onto the grid.
    ///
    /// The first call anchors `hist_start_time`. Slot mapping uses the
    /// caller-provided window start so the window tracks tempo state.
    pub fn add_event(&mut self, event: &CanonicalEvent, slot_ms: f64, hist_start_time: f64) {
        if self.hist_start_time.is_none() {
            self.hist_start_time = Some(hist_start_time);
        }

        let slot = ((event.t_server_ms - hist_start_time) / slot_ms).round() as i64;
        if slot < 0 || slot >= self.history_slots as i64 {
            // Out of window: drop without error
            return;
        }
        let s = slot as usize;

        self.hist_onset[s] = 1.0;

        let dur_slots = ((event.dur_ms / slot_ms).round() as i64).max(1) as usize;
        let hold_end = (s + dur_slots).min(self.history_slots);
        for j in s..hold_end {
            self.hist_hold[j] = 1.0;
        }

        // Cluster confidence normalized to 0-1 (5 contributors saturate)
        self.hist_conf[s] = (event.conf as f64 / 5.0).min(1.0);
    }

    /// Copies of the onset/hold/confidence arrays for predictor consumption
    pub fn history_arrays(&self) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        (
            self.hist_onset.clone(),
            self.hist_hold.clone(),
            self.hist_conf.clone(),
        )
    }

    pub fn history_beats(&self) -> usize {
        self.history_beats
    }

    pub fn history_slots(&self) -> usize {
        self.history_slots
    }

    pub fn hist_start_time(&self) -> Option<f64> {
        self.hist_start_time
    }
}

impl Default for GridEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_BEATS)
    }
}
