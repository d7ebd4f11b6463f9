//! Unit tests for the slot-grid history encoder
//!
//! Covers slot mapping, the one-past-the-end boundary, hold painting with
//! clipping, and confidence normalization.

use pulsegrid_sync::engine::{CanonicalEvent, GridEncoder};

const SLOT_MS: f64 = 10.0;

fn canonical(t_server_ms: f64, dur_ms: f64, conf: usize) -> CanonicalEvent {
    CanonicalEvent {
        t_server_ms,
        dur_ms,
        conf,
        spread_ms: 0.0,
        contributors: vec!["dev".to_string()],
    }
}

#[test]
fn test_event_maps_to_slot() {
    let mut grid = GridEncoder::new(8); // 256 slots
    grid.add_event(&canonical(500.0, 10.0, 1), SLOT_MS, 0.0);

    let (onset, hold, conf) = grid.history_arrays();
    assert_eq!(onset[50], 1.0);
    assert_eq!(hold[50], 1.0);
    assert!((conf[50] - 0.2).abs() < 1e-12); // conf 1 / 5
    assert_eq!(onset.iter().sum::<f64>(), 1.0);
}

#[test]
fn test_one_past_last_slot_is_dropped() {
    let mut grid = GridEncoder::new(8);

    // Exactly history_slots * slot_ms: one past the last valid slot
    grid.add_event(&canonical(2560.0, 10.0, 1), SLOT_MS, 0.0);
    let (onset, _, _) = grid.history_arrays();
    assert_eq!(onset.iter().sum::<f64>(), 0.0);

    // One slot earlier is recorded
    grid.add_event(&canonical(2550.0, 10.0, 1), SLOT_MS, 0.0);
    let (onset, _, _) = grid.history_arrays();
    assert_eq!(onset[255], 1.0);
}

#[test]
fn test_negative_slot_is_dropped() {
    let mut grid = GridEncoder::new(8);
    grid.add_event(&canonical(100.0, 10.0, 1), SLOT_MS, 200.0);
    let (onset, _, _) = grid.history_arrays();
    assert_eq!(onset.iter().sum::<f64>(), 0.0);
}

#[test]
fn test_hold_painting_spans_duration() {
    let mut grid = GridEncoder::new(8);
    grid.add_event(&canonical(100.0, 35.0, 1), SLOT_MS, 0.0);

    // dur_slots = round(35 / 10) = 4
    let (onset, hold, _) = grid.history_arrays();
    assert_eq!(onset[10], 1.0);
    for j in 10..14 {
        assert_eq!(hold[j], 1.0, "slot {} should be held", j);
    }
    assert_eq!(hold[14], 0.0);
}

#[test]
fn test_hold_painting_clips_at_buffer_end() {
    let mut grid = GridEncoder::new(8);
    grid.add_event(&canonical(2550.0, 100.0, 1), SLOT_MS, 0.0);

    let (_, hold, _) = grid.history_arrays();
    assert_eq!(hold[255], 1.0);
    assert_eq!(hold.len(), 256);
}

#[test]
fn test_zero_duration_still_holds_one_slot() {
    let mut grid = GridEncoder::new(8);
    grid.add_event(&canonical(100.0, 0.0, 1), SLOT_MS, 0.0);

    let (_, hold, _) = grid.history_arrays();
    assert_eq!(hold[10], 1.0);
    assert_eq!(hold[11], 0.0);
}

#[test]
fn test_confidence_saturates_at_five_contributors() {
    let mut grid = GridEncoder::new(8);
    grid.add_event(&canonical(100.0, 10.0, 7), SLOT_MS, 0.0);

    let (_, _, conf) = grid.history_arrays();
    assert_eq!(conf[10], 1.0);
}

#[test]
fn test_first_event_anchors_start_time() {
    let mut grid = GridEncoder::new(8);
    assert!(grid.hist_start_time().is_none());

    grid.add_event(&canonical(100.0, 10.0, 1), SLOT_MS, 50.0);
    assert_eq!(grid.hist_start_time(), Some(50.0));

    // Later calls keep the original anchor
    grid.add_event(&canonical(300.0, 10.0, 1), SLOT_MS, 99.0);
    assert_eq!(grid.hist_start_time(), Some(50.0));
}
