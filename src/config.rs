use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Runtime settings, loaded from `config.toml` and overridden by CLI flags
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Published snapshot read by the status bar
    pub cache_file: PathBuf,
    /// Marker file held while a refresh is generating
    pub lock_file: PathBuf,
    /// Minimum seconds between regenerations
    pub stale_secs: u64,
    /// Lock age after which the holder is presumed crashed
    pub lock_expiry_secs: u64,
    /// Upper bound on each external tool call
    pub command_timeout_ms: u64,
    /// Path to tmux binary
    pub tmux_path: String,
}

impl Default for Config {
    fn default() -> Self {
        let tmp = std::env::temp_dir();
        Self {
            cache_file: tmp.join("tmux-mem-usage.json"),
            lock_file: tmp.join("tmux-mem-usage.lock"),
            stale_secs: 5,
            lock_expiry_secs: 30,
            command_timeout_ms: 3000,
            tmux_path: "tmux".to_string(),
        }
    }
}

impl Config {
    pub fn stale_window(&self) -> Duration {
        Duration::from_secs(self.stale_secs)
    }

    pub fn lock_expiry(&self) -> Duration {
        Duration::from_secs(self.lock_expiry_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("pane-mem").join("config.toml"))
}

/// Load from the default location, falling back to defaults when absent
pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

/// Load from `path`; unreadable or malformed files yield defaults
pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "cannot read config, using defaults");
            Config::default()
        }
    }
}
