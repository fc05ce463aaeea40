//! Application settings and the master switch derived from them

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::error::Result;
use crate::scheduler::ActivityGate;

/// Name of the directory below the platform config dir
pub const APP_DIR_NAME: &str = "dirmirror";

/// Persisted entry list
pub const ENTRIES_FILE: &str = "syncs.json";

/// Persisted application settings
pub const SETTINGS_FILE: &str = "settings.json";

/// Platform default data directory, falling back to the working directory
pub fn default_data_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Application-wide settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Whether automatic syncs run at all
    #[serde(default)]
    pub app_active: bool,
}

impl AppSettings {
    /// Load settings, writing the defaults first if the file does not exist
    pub async fn load(path: &Path) -> Result<Self> {
        if !fs::try_exists(path).await? {
            let settings = Self::default();
            settings.save(path).await?;
            info!(path = %path.display(), "Created default settings");
            return Ok(settings);
        }

        let content = fs::read_to_string(path).await?;
        let settings: Self = serde_json::from_str(&content)?;
        debug!(path = %path.display(), app_active = settings.app_active, "Loaded settings");
        Ok(settings)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }
}

/// Shared, cloneable application-active flag
#[derive(Debug, Clone, Default)]
pub struct MasterSwitch(Arc<AtomicBool>);

impl MasterSwitch {
    pub fn new(active: bool) -> Self {
        Self(Arc::new(AtomicBool::new(active)))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns the previous value
    pub fn set_active(&self, active: bool) -> bool {
        self.0.swap(active, Ordering::SeqCst)
    }
}

impl From<&AppSettings> for MasterSwitch {
    fn from(settings: &AppSettings) -> Self {
        Self::new(settings.app_active)
    }
}

impl ActivityGate for MasterSwitch {
    fn is_active(&self) -> bool {
        MasterSwitch::is_active(self)
    }
}
