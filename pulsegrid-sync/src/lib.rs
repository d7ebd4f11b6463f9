//! # PulseGrid Synchronizer Library (pulsegrid-sync)
//!
//! Pulse synchronization and phrase-prediction engine.
//!
//! **Purpose:** Fuse rhythmic pulse events reported by many clock-skewed
//! network clients into one shared beat grid, track tempo and phase with a
//! PLL, and forecast the next 4-beat phrase (128 slots of 1/32 beat) so
//! clients can render a cue before the beat occurs.
//!
//! **Architecture:** A single `PredictionEngine` owns all pipeline stages
//! (clock sync, event fusion, tempo tracking, grid encoding, predictors)
//! behind one mutex, wrapped by an axum HTTP interface with best-effort
//! SQLite persistence.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;

pub use engine::PredictionEngine;
pub use error::{Error, Result};
