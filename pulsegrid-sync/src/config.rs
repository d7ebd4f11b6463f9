//! pulsegrid-sync specific configuration
//!
//! Bootstrap TOML configuration with graceful degradation: a missing or
//! unreadable config file logs a warning and starts with defaults rather
//! than terminating.

use crate::engine::PredictionMode;
use pulsegrid_common::config::{default_data_folder, find_config_file};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Synchronizer service configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP listen port
    pub port: u16,
    /// Prediction strategy selected at construction
    pub mode: PredictionMode,
    /// Starting BPM estimate for the tempo tracker
    pub initial_bpm: f64,
    /// Event fusion clustering half-window in milliseconds
    pub fusion_window_ms: f64,
    /// SQLite database file name (within the data folder)
    pub database_file: String,
    /// Records loaded to seed slot priors at startup (bootstrap mode)
    pub prior_seed_limit: i64,
    /// Record pipeline traces for the /traces endpoint
    pub enable_tracing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8750,
            mode: PredictionMode::Bootstrap,
            initial_bpm: 120.0,
            fusion_window_ms: 30.0,
            database_file: "pulsegrid.db".to_string(),
            prior_seed_limit: 10_000,
            enable_tracing: false,
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, or from the platform
    /// config file, falling back to defaults.
    pub fn load(explicit_path: Option<&Path>) -> Self {
        let path = match explicit_path {
            Some(p) => p.to_path_buf(),
            None => match find_config_file() {
                Ok(p) => p,
                Err(_) => {
                    info!("No config file found, using defaults");
                    return Self::default();
                }
            },
        };

        match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<Config>(&content) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?}: {} (using defaults)", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config file {:?}: {} (using defaults)", path, e);
                Self::default()
            }
        }
    }

    /// Full path of the SQLite database file under the resolved data folder
    pub fn database_path(&self, data_folder: Option<&Path>) -> PathBuf {
        let folder = data_folder
            .map(|p| p.to_path_buf())
            .unwrap_or_else(default_data_folder);
        folder.join(&self.database_file)
    }
}
