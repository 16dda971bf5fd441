//! Optional TOML configuration.
//!
//! Looked up at `$DEVPROBE_CONFIG` or `<config dir>/devprobe/config.toml`.
//! A missing or broken file never stops the probe; defaults are used instead.

use crate::error::Result;
use crate::utils::file::read_file_safe;
use dirs::config_dir;
use serde::Deserialize;
use std::{collections::HashMap, env, path::{Path, PathBuf}, time::Duration};
use tracing::{debug, warn};

pub const CONFIG_ENV: &str = "DEVPROBE_CONFIG";

#[derive(Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub probe: ProbeConfig,
    pub display: DisplayConfig,
    pub colors: HashMap<String, String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ProbeConfig {
    /// Upper bound for any external command
    pub command_timeout_secs: u64,
    /// Vendor telemetry tool
    pub gpu_query_command: String,
    /// Allow the name-only enumeration fallback
    pub fallback_enabled: bool,
    /// Overrides the platform default enumeration command
    pub fallback_command: Option<Vec<String>>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 5,
            gpu_query_command: "nvidia-smi".to_string(),
            fallback_enabled: true,
            fallback_command: None,
        }
    }
}

impl ProbeConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs.max(1))
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DisplayConfig {
    pub separator: String,
    /// Color name, `#rrggbb`, or a key of `[colors]`
    pub key_color: Option<String>,
    pub title_color: Option<String>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            separator: ": ".to_string(),
            key_color: None,
            title_color: None,
        }
    }
}

/// Config file location, honoring `$DEVPROBE_CONFIG` (with `~` expansion)
pub fn config_path() -> Option<PathBuf> {
    if let Ok(custom) = env::var(CONFIG_ENV) {
        if !custom.trim().is_empty() {
            return Some(PathBuf::from(shellexpand::tilde(custom.trim()).to_string()));
        }
    }
    config_dir().map(|p| p.join("devprobe/config.toml"))
}

pub fn parse_config(data: &str) -> Result<Config> {
    Ok(toml::de::from_str(data)?)
}

/// Read and parse a specific file
pub fn load_config_from(path: &Path) -> Result<Config> {
    let data = read_file_safe(path)?;
    parse_config(&data)
}

/// Load the user config, falling back to defaults
pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        debug!("No config directory on this platform, using defaults");
        return Config::default();
    };

    if !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return Config::default();
    }

    match load_config_from(&path) {
        Ok(config) => {
            debug!(path = %path.display(), "Loaded config");
            config
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "Ignoring unreadable config file");
            Config::default()
        }
    }
}
