//! Configuration loading and data folder resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Resolve the service data folder (database location) in priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file (`data_folder` key)
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_data_folder(cli_arg: Option<&str>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = find_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(data_folder) = config.get("data_folder").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(data_folder));
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_data_folder())
}

/// Locate the platform config file (`pulsegrid/config.toml`)
pub fn find_config_file() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/pulsegrid/config.toml first, then /etc/pulsegrid/config.toml
        let user_config = dirs::config_dir().map(|d| d.join("pulsegrid").join("config.toml"));
        let system_config = PathBuf::from("/etc/pulsegrid/config.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        return Err(Error::Config("No config file found".to_string()));
    }

    let config_path = dirs::config_dir()
        .map(|d| d.join("pulsegrid").join("config.toml"))
        .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;

    if config_path.exists() {
        Ok(config_path)
    } else {
        Err(Error::Config(format!(
            "Config file not found: {:?}",
            config_path
        )))
    }
}

/// OS-dependent default data folder
pub fn default_data_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/pulsegrid (or /var/lib/pulsegrid for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("pulsegrid"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/pulsegrid"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("pulsegrid"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/pulsegrid"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("pulsegrid"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\pulsegrid"))
    } else {
        PathBuf::from("./pulsegrid_data")
    }
}
