//! Configuration loading from file system
//!
//! Handles reading and parsing the JSON config file.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use super::defaults::DEFAULT_CONFIG_PATH;
use super::types::Config;
use crate::error::KeybindError;

/// Path of the user config file (~/.keybind-macro/config.json)
pub fn config_path() -> PathBuf {
    PathBuf::from(shellexpand::tilde(DEFAULT_CONFIG_PATH).as_ref())
}

/// Load configuration from ~/.keybind-macro/config.json
///
/// Returns Config::default() if the file is missing or cannot be parsed.
#[instrument(name = "load_config")]
pub fn load_config() -> Config {
    let config_path = config_path();

    if !config_path.exists() {
        info!(path = %config_path.display(), "Config file not found, using defaults");
        return Config::default();
    }

    match load_config_from(&config_path) {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Failed to load config, using defaults");
            Config::default()
        }
    }
}

/// Load and parse a specific config file.
pub fn load_config_from(path: &Path) -> Result<Config, KeybindError> {
    let contents = fs::read_to_string(path).map_err(|e| KeybindError::Config {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    let config = serde_json::from_str::<Config>(&contents).map_err(|e| {
        let hint = if e.to_string().contains("missing field `sequence`")
            || e.to_string().contains("missing field `command`")
        {
            " (each binding needs 'sequence' and 'command', e.g. {\"sequence\": \"CTRL+5 CTRL+A\", \"command\": \"edit.selectAll\"})"
        } else {
            ""
        };
        KeybindError::Config {
            path: path.display().to_string(),
            message: format!("{}{}", e, hint),
        }
    })?;

    info!(
        path = %path.display(),
        bindings = config.bindings.len(),
        "Successfully loaded config"
    );
    Ok(config)
}
