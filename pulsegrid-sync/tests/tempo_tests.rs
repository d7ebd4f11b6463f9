//! Unit tests for the tempo/phase PLL
//!
//! Covers anchoring, convergence on a steady pulse train, the BPM clamp
//! under outliers, and phrase-start grid alignment.

use pulsegrid_sync::engine::{CanonicalEvent, TempoTracker};

fn canonical(t_server_ms: f64) -> CanonicalEvent {
    CanonicalEvent {
        t_server_ms,
        dur_ms: 100.0,
        conf: 1,
        spread_ms: 0.0,
        contributors: vec!["dev".to_string()],
    }
}

#[test]
fn test_first_event_only_anchors_phase() {
    let mut tracker = TempoTracker::new(120.0);
    assert!(tracker.t_last_beat().is_none());

    tracker.update(&canonical(1000.0));
    assert_eq!(tracker.t_last_beat(), Some(1000.0));
    assert_eq!(tracker.bpm(), 120.0);
}

#[test]
fn test_steady_500ms_train_holds_120_bpm() {
    let mut tracker = TempoTracker::new(120.0);

    // Zero-jitter canonical events every 500 ms (exactly 120 BPM)
    for i in 0..30 {
        tracker.update(&canonical(i as f64 * 500.0));
    }

    assert!((tracker.bpm() - 120.0).abs() / 120.0 < 0.01);
    assert!(tracker.bpm() >= 60.0 && tracker.bpm() <= 200.0);
}

#[test]
fn test_phase_pulls_toward_late_events() {
    let mut tracker = TempoTracker::new(120.0);
    tracker.update(&canonical(0.0));

    // Event 20 ms late of the predicted boundary at 500
    tracker.update(&canonical(520.0));

    // t_last_beat += 0.2 * 20
    assert!((tracker.t_last_beat().unwrap() - 4.0).abs() < 1e-9);
}

#[test]
fn test_bpm_clamped_under_outliers() {
    let mut tracker = TempoTracker::new(120.0);
    tracker.update(&canonical(0.0));

    // Adversarial spacing; the per-event tempo nudge is bounded by
    // tempo_gain * beat_ms / 2, and the clamp is authoritative
    let mut t = 0.0;
    for i in 0..200 {
        t += if i % 2 == 0 { 130.0 } else { 90_000.0 };
        tracker.update(&canonical(t));
        let bpm = tracker.bpm();
        assert!((60.0..=200.0).contains(&bpm), "bpm {} out of clamp", bpm);
        assert!((tracker.beat_ms() - 60_000.0 / bpm).abs() < 1e-9);
    }
}

#[test]
fn test_next_phrase_start_untracked_returns_now() {
    let tracker = TempoTracker::new(120.0);
    assert_eq!(tracker.next_phrase_start(1234.5), 1234.5);
}

#[test]
fn test_next_phrase_start_is_beat_aligned_and_ahead() {
    let mut tracker = TempoTracker::new(120.0);
    tracker.update(&canonical(0.0));

    let t_now = 730.0;
    let start = tracker.next_phrase_start(t_now);

    assert!(start > t_now);

    // Aligned to a multiple of 32 slots from the beat anchor
    let slot_ms = tracker.slot_ms();
    let slots = (start - tracker.t_last_beat().unwrap()) / slot_ms;
    let rounded = slots.round();
    assert!((slots - rounded).abs() < 1e-6);
    assert_eq!(rounded as i64 % 32, 0);
}

#[test]
fn test_slot_ms_is_beat_over_32() {
    let tracker = TempoTracker::new(120.0);
    assert!((tracker.slot_ms() - 500.0 / 32.0).abs() < 1e-12);
}
