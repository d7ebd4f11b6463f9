//! Deterministic realtime predictor
//!
//! Maintains an EMA of the onset-density pattern over the grid history and
//! per-slot-position pools of observed onset durations. Prediction tiles
//! the last beat's smoothed pattern across the 4-beat output, emitting an
//! onset wherever the density exceeds the threshold, with the median
//! observed duration at that slot position.

use super::stats::median_u32;
use super::types::{PHRASE_SLOTS, SLOTS_PER_BEAT};
use std::collections::HashMap;

const DEFAULT_THRESHOLD: f64 = 0.5;
const PATTERN_EMA_ALPHA: f64 = 0.1;

/// Duration samples retained per slot position
const MAX_DUR_SAMPLES: usize = 100;

#[derive(Debug)]
pub struct DeterministicPredictor {
    threshold: f64,
    /// Smoothed onset-density over the full history window; seeded verbatim
    /// from the first snapshot
    pattern_ema: Option<Vec<f64>>,
    /// slot position (0..32) -> observed onset durations in slots
    dur_patterns: HashMap<usize, Vec<u32>>,
}

impl DeterministicPredictor {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            pattern_ema: None,
            dur_patterns: HashMap::new(),
        }
    }

    /// Harvest per-slot-position duration samples from a history snapshot.
    ///
    /// An onset's duration is the consecutive hold run length starting at
    /// the onset, capped at one beat.
    pub fn update_from_history(&mut self, hist_onset: &[f64], hist_hold: &[f64]) {
        for i in 0..hist_onset.len() {
            if hist_onset[i] <= 0.5 {
                continue;
            }
            let slot_pos = i % SLOTS_PER_BEAT;

            let mut dur: u32 = 1;
            let run_end = (i + SLOTS_PER_BEAT).min(hist_hold.len());
            for j in (i + 1)..run_end {
                if hist_hold[j] > 0.5 {
                    dur += 1;
                } else {
                    break;
                }
            }

            let samples = self.dur_patterns.entry(slot_pos).or_default();
            samples.push(dur);
            if samples.len() > MAX_DUR_SAMPLES {
                let excess = samples.len() - MAX_DUR_SAMPLES;
                samples.drain(..excess);
            }
        }
    }

    /// Predict the next 128 slots from a history snapshot.
    ///
    /// Also advances the density EMA; insufficient history (<32 smoothed
    /// values) still produces output from whatever is available.
    pub fn predict(
        &mut self,
        hist_onset: &[f64],
        _hist_hold: &[f64],
        _hist_conf: &[f64],
    ) -> (Vec<f64>, Vec<u32>) {
        let ema = match self.pattern_ema.as_mut() {
            Some(ema) if ema.len() == hist_onset.len() => {
                for (smoothed, &observed) in ema.iter_mut().zip(hist_onset) {
                    *smoothed = (1.0 - PATTERN_EMA_ALPHA) * *smoothed + PATTERN_EMA_ALPHA * observed;
                }
                ema
            }
            _ => {
                self.pattern_ema = Some(hist_onset.to_vec());
                self.pattern_ema.as_mut().unwrap()
            }
        };

        // Canonical one-beat pattern: the last 32 smoothed values
        let pattern_start = ema.len().saturating_sub(SLOTS_PER_BEAT);
        let pattern = &ema[pattern_start..];

        let mut pred_onset = vec![0.0; PHRASE_SLOTS];
        let mut pred_dur_slots = vec![0u32; PHRASE_SLOTS];

        for i in 0..PHRASE_SLOTS {
            let slot_pos = i % SLOTS_PER_BEAT;
            if slot_pos >= pattern.len() {
                continue;
            }
            if pattern[slot_pos] > self.threshold {
                pred_onset[i] = 1.0;
                pred_dur_slots[i] = match self.dur_patterns.get(&slot_pos) {
                    Some(samples) if !samples.is_empty() => median_u32(samples),
                    _ => 1,
                };
            }
        }

        (pred_onset, pred_dur_slots)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn pattern_ema_len(&self) -> usize {
        self.pattern_ema.as_ref().map(|p| p.len()).unwrap_or(0)
    }

    pub fn duration_pattern_count(&self) -> usize {
        self.dur_patterns.len()
    }
}

impl Default for DeterministicPredictor {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
