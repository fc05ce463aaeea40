//! JSON persistence of the entry list

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::entry::{EntryConfig, SyncEntry, DEFAULT_PERIOD_MINUTES};
use crate::error::Result;

fn default_period() -> u32 {
    DEFAULT_PERIOD_MINUTES
}

fn default_enabled() -> bool {
    true
}

/// Persisted form of one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub id: i64,
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    #[serde(default = "default_enabled")]
    pub is_enabled: bool,
    #[serde(default = "Local::now")]
    pub last_checked: DateTime<Local>,
    #[serde(default = "default_period")]
    pub period_minutes: u32,
}

impl EntryRecord {
    pub fn config(&self) -> EntryConfig {
        EntryConfig {
            source_dir: self.source_dir.clone(),
            target_dir: self.target_dir.clone(),
            enabled: self.is_enabled,
            period_minutes: self.period_minutes,
            last_checked: self.last_checked,
        }
    }
}

impl From<&SyncEntry> for EntryRecord {
    fn from(entry: &SyncEntry) -> Self {
        let config = entry.config();
        Self {
            id: entry.id(),
            source_dir: config.source_dir,
            target_dir: config.target_dir,
            is_enabled: config.enabled,
            last_checked: config.last_checked,
            period_minutes: config.period_minutes,
        }
    }
}

/// File-backed entry list. One reader or writer at a time.
#[derive(Debug)]
pub struct EntryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EntryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read all records; an absent file is an empty list
    pub async fn load(&self) -> Result<Vec<EntryRecord>> {
        let _guard = self.lock.lock().await;

        if !fs::try_exists(&self.path).await? {
            debug!(path = %self.path.display(), "No entry list yet");
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path).await?;
        let records: Vec<EntryRecord> = serde_json::from_str(&content)?;
        debug!(path = %self.path.display(), count = records.len(), "Loaded entries");
        Ok(records)
    }

    /// Replace the whole file with `records`
    pub async fn save(&self, records: &[EntryRecord]) -> Result<()> {
        self.save_with(|| records.to_vec()).await
    }

    /// Replace the whole file with the records `snapshot` returns.
    ///
    /// `snapshot` runs only once the store is free, so the last writer
    /// always persists the latest state.
    pub async fn save_with<F>(&self, snapshot: F) -> Result<()>
    where
        F: FnOnce() -> Vec<EntryRecord>,
    {
        let _guard = self.lock.lock().await;
        let records = snapshot();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(&records)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &self.path).await?;

        debug!(path = %self.path.display(), count = records.len(), "Saved entries");
        Ok(())
    }
}
