/// Application configuration management
/// Stores user preferences in ~/.config/dockwatch/config.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::utils::constants::{
    DEFAULT_LOG_TAIL, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_QUERY_TIMEOUT_SECS,
    DEFAULT_RENDER_TICK_MS,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Seconds between background poll cycles
    pub poll_interval_secs: u64,
    /// Milliseconds between UI render ticks
    pub render_tick_ms: u64,
    /// Seconds before a per-container engine query is abandoned
    pub query_timeout_secs: u64,
    /// Log lines fetched for the logs view
    pub log_tail: usize,
    /// Override for the compose command, e.g. ["docker", "compose"]
    pub compose_command: Option<Vec<String>>,
    /// Directory containing the compose file, used as working dir for rebuilds
    pub project_root: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            render_tick_ms: DEFAULT_RENDER_TICK_MS,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            log_tail: DEFAULT_LOG_TAIL,
            compose_command: None,
            project_root: None,
        }
    }
}

impl AppConfig {
    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine the user config directory")?
            .join("dockwatch");

        fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from an explicit path; missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn render_tick(&self) -> Duration {
        Duration::from_millis(self.render_tick_ms.max(100))
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.poll_interval_secs, DEFAULT_POLL_INTERVAL_SECS);
        assert_eq!(config.render_tick_ms, DEFAULT_RENDER_TICK_MS);
        assert_eq!(config.log_tail, DEFAULT_LOG_TAIL);
        assert!(config.compose_command.is_none());
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig {
            poll_interval_secs: 15,
            log_tail: 200,
            compose_command: Some(vec!["docker".into(), "compose".into()]),
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.poll_interval_secs, 15);
        assert_eq!(loaded.log_tail, 200);
        assert_eq!(
            loaded.compose_command.as_deref(),
            Some(&["docker".to_string(), "compose".to_string()][..])
        );
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "poll_interval_secs = 5\n").unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded.poll_interval_secs, 5);
        assert_eq!(loaded.render_tick_ms, DEFAULT_RENDER_TICK_MS);
    }

    #[test]
    fn intervals_are_clamped() {
        let config = AppConfig {
            poll_interval_secs: 0,
            render_tick_ms: 0,
            query_timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.render_tick(), Duration::from_millis(100));
        assert_eq!(config.query_timeout(), Duration::from_secs(1));
    }
}
