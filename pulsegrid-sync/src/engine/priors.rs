//! Slot priors and the bootstrap predictor
//!
//! Bootstrap mode predicts from per-slot-position statistics aggregated
//! over historical 32-slot pattern batches, with no live fusion required.
//! Each batch fold-in replaces the model state wholesale; there is no
//! incremental averaging beyond a full recompute over the provided batch.

use super::stats::median;
use super::types::{PHRASE_SLOTS, SLOTS_PER_BEAT};
use serde_json::Value;
use tracing::warn;

const DEFAULT_THRESHOLD: f64 = 0.5;

/// A stored pattern/duration pair as read back from the predictions table.
///
/// Fields hold either a JSON array value or a JSON-encoded string of one,
/// depending on how the column was written.
#[derive(Debug, Clone)]
pub struct PatternRecord {
    pub pattern: Option<Value>,
    pub durations: Option<Value>,
}

/// Per-slot-position onset priors over one beat
#[derive(Debug)]
pub struct SlotPriorModel {
    threshold: f64,
    p_onset: Option<Vec<f64>>,
    median_dur_slots: Vec<u32>,
    confidence: Vec<f64>,
    sample_count: usize,
}

impl SlotPriorModel {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            p_onset: None,
            median_dur_slots: vec![1; SLOTS_PER_BEAT],
            confidence: vec![0.0; SLOTS_PER_BEAT],
            sample_count: 0,
        }
    }

    /// Rebuild priors from a batch of 32-slot patterns.
    ///
    /// Patterns shorter than 32 slots are skipped (they still count toward
    /// the batch size). Only the first 32 positions of longer patterns are
    /// used. An empty batch leaves the model untouched.
    pub fn update_from_patterns(&mut self, patterns: &[Vec<i64>], durations: Option<&[Vec<i64>]>) {
        if patterns.is_empty() {
            return;
        }

        let mut slot_counts = [0.0f64; SLOTS_PER_BEAT];
        let mut slot_durations: Vec<Vec<f64>> = vec![Vec::new(); SLOTS_PER_BEAT];

        for (pattern_idx, pattern) in patterns.iter().enumerate() {
            if pattern.len() < SLOTS_PER_BEAT {
                continue;
            }
            for (i, &val) in pattern[..SLOTS_PER_BEAT].iter().enumerate() {
                if val > 0 {
                    slot_counts[i] += 1.0;
                }
            }

            if let Some(durations) = durations {
                if let Some(dur_pattern) = durations.get(pattern_idx) {
                    if dur_pattern.len() >= SLOTS_PER_BEAT {
                        for (j, &dur) in dur_pattern[..SLOTS_PER_BEAT].iter().enumerate() {
                            if dur > 0 {
                                slot_durations[j].push(dur as f64);
                            }
                        }
                    }
                }
            }
        }

        self.sample_count = patterns.len();
        let n = patterns.len().max(1) as f64;
        let p_onset: Vec<f64> = slot_counts.iter().map(|&c| c / n).collect();

        self.median_dur_slots = slot_durations
            .iter()
            .map(|samples| {
                if samples.is_empty() {
                    1
                } else {
                    median(samples) as u32
                }
            })
            .collect();

        // Confidence is the onset probability itself; no separate calibration
        self.confidence = p_onset.clone();
        self.p_onset = Some(p_onset);
    }

    /// Rebuild priors from stored prediction records.
    ///
    /// JSON-encoded text columns are decoded; a record may hold one flat
    /// slot array or a batch of them. Patterns shorter than 32 slots are
    /// tiled up to length rather than skipped (the stored data is
    /// known-good, unlike a live client batch).
    pub fn update_from_records(&mut self, records: &[PatternRecord]) {
        let mut patterns: Vec<Vec<i64>> = Vec::new();
        let mut durations: Vec<Vec<i64>> = Vec::new();

        for record in records {
            if let Some(value) = &record.pattern {
                for pattern in decode_slot_arrays(value) {
                    if let Some(tiled) = tile_to_beat(&pattern) {
                        patterns.push(tiled);
                    }
                }
            }
            if let Some(value) = &record.durations {
                for dur in decode_slot_arrays(value) {
                    if let Some(tiled) = tile_to_beat(&dur) {
                        durations.push(tiled);
                    }
                }
            }
        }

        if !patterns.is_empty() {
            let durations = if durations.is_empty() {
                None
            } else {
                Some(durations.as_slice())
            };
            self.update_from_patterns(&patterns, durations);
        }
    }

    /// Whether the model has any data to predict from
    pub fn is_ready(&self) -> bool {
        self.p_onset.is_some() && self.sample_count > 0
    }

    /// Prior for a slot position: (onset probability, median duration, confidence)
    pub fn prior(&self, slot_index: usize) -> (f64, u32, f64) {
        let p_onset = match &self.p_onset {
            Some(p) if self.sample_count > 0 => p,
            _ => return (0.0, 1, 0.0),
        };
        let idx = slot_index % SLOTS_PER_BEAT;
        (p_onset[idx], self.median_dur_slots[idx], self.confidence[idx])
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }
}

impl Default for SlotPriorModel {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

/// Decode slot arrays stored either as a JSON array (flat, or a batch of
/// arrays) or as a JSON-encoded string of one
fn decode_slot_arrays(value: &Value) -> Vec<Vec<i64>> {
    let decoded = match value {
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(inner) => inner,
            Err(e) => {
                warn!("Skipping undecodable slot array: {}", e);
                return Vec::new();
            }
        },
        other => other.clone(),
    };

    let items = match decoded.as_array() {
        Some(items) => items,
        None => return Vec::new(),
    };

    if items.iter().all(|v| v.is_array()) && !items.is_empty() {
        // A batch of slot arrays
        items
            .iter()
            .filter_map(|v| v.as_array())
            .map(|inner| inner.iter().filter_map(|v| v.as_f64().map(|f| f as i64)).collect())
            .collect()
    } else {
        // One flat slot array
        vec![items.iter().filter_map(|v| v.as_f64().map(|f| f as i64)).collect()]
    }
}

/// Truncate to 32 slots, or tile a shorter non-empty array up to 32
fn tile_to_beat(values: &[i64]) -> Option<Vec<i64>> {
    if values.is_empty() {
        return None;
    }
    if values.len() >= SLOTS_PER_BEAT {
        return Some(values[..SLOTS_PER_BEAT].to_vec());
    }
    let repeats = SLOTS_PER_BEAT / values.len() + 1;
    let mut tiled = Vec::with_capacity(repeats * values.len());
    for _ in 0..repeats {
        tiled.extend_from_slice(values);
    }
    tiled.truncate(SLOTS_PER_BEAT);
    Some(tiled)
}

/// Fast 128-slot phrase predictor over the slot priors
#[derive(Debug)]
pub struct BootstrapPredictor {
    model: SlotPriorModel,
    threshold: f64,
}

impl BootstrapPredictor {
    pub fn new(model: SlotPriorModel) -> Self {
        let threshold = model.threshold();
        Self { model, threshold }
    }

    pub fn with_threshold(model: SlotPriorModel, threshold: f64) -> Self {
        Self { model, threshold }
    }

    /// Predict a 4-beat phrase: (onset, dur_slots, confidence).
    ///
    /// An empty model answers with all zeros rather than erroring —
    /// bootstrap mode must always answer quickly.
    pub fn predict_phrase(&self) -> (Vec<f64>, Vec<u32>, Vec<f64>) {
        if !self.model.is_ready() {
            return (
                vec![0.0; PHRASE_SLOTS],
                vec![0; PHRASE_SLOTS],
                vec![0.0; PHRASE_SLOTS],
            );
        }

        let mut onset = vec![0.0; PHRASE_SLOTS];
        let mut dur_slots = vec![0u32; PHRASE_SLOTS];
        let mut confidence = vec![0.0; PHRASE_SLOTS];

        for i in 0..PHRASE_SLOTS {
            let (p_onset, median_dur, conf) = self.model.prior(i % SLOTS_PER_BEAT);
            if p_onset > self.threshold {
                onset[i] = 1.0;
                dur_slots[i] = median_dur.max(1);
            }
            // Confidence is copied through whether or not the onset fired
            confidence[i] = conf;
        }

        (onset, dur_slots, confidence)
    }

    pub fn model(&self) -> &SlotPriorModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut SlotPriorModel {
        &mut self.model
    }
}
