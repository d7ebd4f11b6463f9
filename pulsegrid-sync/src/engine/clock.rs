//! Per-device clock synchronization (offset + drift estimation)
//!
//! Each device reports NTP-like ping round trips. The offset is smoothed
//! with an EMA; once enough samples accumulate, a drift coefficient is
//! estimated from the offset change over elapsed device time. Conversion is
//! `t_server = drift * t_device + offset`. A device with no calibration data
//! maps through unchanged: inaccurate, but never an error.

use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Default EMA gain for offset smoothing (0.05-0.2 recommended)
const DEFAULT_ALPHA: f64 = 0.1;

/// Calibration samples retained per device for drift estimation
const MAX_HISTORY: usize = 50;

/// Samples required before drift is estimated
const DRIFT_MIN_SAMPLES: usize = 10;

#[derive(Debug)]
struct DeviceClock {
    offset_ms: f64,
    drift: f64,
    /// (t_device, raw_offset) pairs, oldest first
    history: VecDeque<(f64, f64)>,
}

/// Per-device snapshot for state introspection
#[derive(Debug, Clone, Serialize)]
pub struct DeviceClockSnapshot {
    pub offset_ms: f64,
    pub drift: f64,
    pub history_count: usize,
}

/// Maintains the device-local-time to server-time mapping for every device
#[derive(Debug)]
pub struct ClockSync {
    alpha: f64,
    devices: HashMap<String, DeviceClock>,
}

impl ClockSync {
    pub fn new() -> Self {
        Self::with_alpha(DEFAULT_ALPHA)
    }

    pub fn with_alpha(alpha: f64) -> Self {
        Self {
            alpha,
            devices: HashMap::new(),
        }
    }

    /// Ingest one ping round-trip sample.
    ///
    /// `t0_device`: device time when the ping was sent, `t1_server`: server
    /// time when it was received, `t2_device`: device time when the response
    /// arrived back.
    pub fn update_from_ping(&mut self, device_id: &str, t0_device: f64, t1_server: f64, t2_device: f64) {
        let rtt = t2_device - t0_device;
        let one_way = rtt / 2.0;
        let raw_offset = t1_server - (t0_device + one_way);

        let alpha = self.alpha;
        let clock = self
            .devices
            .entry(device_id.to_string())
            .or_insert_with(|| DeviceClock {
                // First sample sets the offset verbatim, not EMA-blended with zero
                offset_ms: raw_offset,
                drift: 1.0,
                history: VecDeque::with_capacity(MAX_HISTORY),
            });

        if clock.history.is_empty() {
            clock.offset_ms = raw_offset;
        } else {
            clock.offset_ms = (1.0 - alpha) * clock.offset_ms + alpha * raw_offset;
        }

        if clock.history.len() == MAX_HISTORY {
            clock.history.pop_front();
        }
        clock.history.push_back((t0_device, raw_offset));

        if clock.history.len() >= DRIFT_MIN_SAMPLES {
            Self::estimate_drift(clock);
        }
    }

    /// Drift from offset change over elapsed device time.
    ///
    /// The `1e-3` scale is kept from the reference implementation; its
    /// numeric effect on conversion is observable behavior.
    fn estimate_drift(clock: &mut DeviceClock) {
        let (t_first, offset_first) = match clock.history.front() {
            Some(&v) => v,
            None => return,
        };
        let (t_last, offset_last) = match clock.history.back() {
            Some(&v) => v,
            None => return,
        };

        let dt = t_last - t_first;
        if dt > 0.0 {
            let doffset = offset_last - offset_first;
            clock.drift = 1.0 + (doffset / dt) * 1e-3;
        }
    }

    /// Convert device time to server time. Unknown devices pass through.
    pub fn convert_to_server_time(&self, device_id: &str, t_device_ms: f64) -> f64 {
        match self.devices.get(device_id) {
            Some(clock) => clock.drift * t_device_ms + clock.offset_ms,
            None => t_device_ms,
        }
    }

    /// Number of devices with at least one calibration sample
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Per-device offset/drift/history snapshot for `get_state()`
    pub fn snapshot(&self) -> HashMap<String, DeviceClockSnapshot> {
        self.devices
            .iter()
            .map(|(id, clock)| {
                (
                    id.clone(),
                    DeviceClockSnapshot {
                        offset_ms: clock.offset_ms,
                        drift: clock.drift,
                        history_count: clock.history.len(),
                    },
                )
            })
            .collect()
    }
}

impl Default for ClockSync {
    fn default() -> Self {
        Self::new()
    }
}
