use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use mirror::scheduler::DEFAULT_TICK;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default)]
    pub daemon: DaemonSettings,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonSettings {
    /// Directory holding the entry list and settings.json
    #[serde(default = "mirror::settings::default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Daily-rolling log file; console only when unset
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// How often settings.json is re-read for the master switch
    #[serde(default = "default_settings_refresh_interval", with = "humantime_serde")]
    pub settings_refresh_interval: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Due-check resolution of every entry's periodic check
    #[serde(default = "default_tick", with = "humantime_serde")]
    pub tick: Duration,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            data_dir: mirror::settings::default_data_dir(),
            log_level: default_log_level(),
            log_file: None,
            settings_refresh_interval: default_settings_refresh_interval(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick: default_tick(),
        }
    }
}

impl DaemonConfig {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: DaemonConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheduler.tick.is_zero() {
            anyhow::bail!("Scheduler tick cannot be zero");
        }
        if self.daemon.settings_refresh_interval.is_zero() {
            anyhow::bail!("Settings refresh interval cannot be zero");
        }
        if self.daemon.data_dir.as_os_str().is_empty() {
            anyhow::bail!("Data directory cannot be empty");
        }
        if !matches!(
            self.daemon.log_level.to_lowercase().as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            anyhow::bail!("Unknown log level: {}", self.daemon.log_level);
        }
        Ok(())
    }

    pub fn entries_path(&self) -> PathBuf {
        self.daemon.data_dir.join(mirror::settings::ENTRIES_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.daemon.data_dir.join(mirror::settings::SETTINGS_FILE)
    }
}

// Default value functions
fn default_log_level() -> String { "info".to_string() }
fn default_settings_refresh_interval() -> Duration { Duration::from_secs(5) }
fn default_tick() -> Duration { DEFAULT_TICK }
