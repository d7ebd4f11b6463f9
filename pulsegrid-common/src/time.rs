//! Time utilities
//!
//! All engine timestamps are server-epoch milliseconds carried as f64,
//! matching the resolution clients report pulses at.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as Unix epoch milliseconds
pub fn server_now_ms() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
        * 1000.0
}
