//! A configured source/target pair, its runtime status and its last operation log

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Local};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::diff::DiffEngine;
use crate::error::{Result, SyncError};
use crate::events::{EntryEvent, Listeners, Property, SubscriptionId};
use crate::executor::{LogSink, PassReport, SyncExecutor};
use crate::paths::are_independent;
use crate::scheduler::ScheduleSlot;

/// Re-check period used when none is given
pub const DEFAULT_PERIOD_MINUTES: u32 = 2;

/// Smallest accepted re-check period
pub const MIN_PERIOD_MINUTES: u32 = 1;

/// Engine status of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Never synced, or reset by a manual request
    Idle,
    /// A pass is running
    Syncing,
    /// The last pass finished without failures
    Synced,
    /// The last pass had at least one failed operation
    Error,
    /// Display-only state for disabled entries
    Stopped,
}

impl SyncStatus {
    pub fn text(self) -> &'static str {
        match self {
            SyncStatus::Idle => "Not synced yet",
            SyncStatus::Syncing => "Synchronizing...",
            SyncStatus::Synced => "In sync",
            SyncStatus::Error => "Error",
            SyncStatus::Stopped => "Disabled",
        }
    }
}

/// Initial configuration of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryConfig {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub enabled: bool,
    pub period_minutes: u32,
    pub last_checked: DateTime<Local>,
}

impl EntryConfig {
    /// Enabled, default period, checked now
    pub fn new(source_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            enabled: true,
            period_minutes: DEFAULT_PERIOD_MINUTES,
            last_checked: Local::now(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn period_minutes(mut self, period_minutes: u32) -> Self {
        self.period_minutes = period_minutes;
        self
    }

    pub fn last_checked(mut self, last_checked: DateTime<Local>) -> Self {
        self.last_checked = last_checked;
        self
    }
}

#[derive(Debug)]
struct EntryState {
    source_dir: PathBuf,
    target_dir: PathBuf,
    enabled: bool,
    period_minutes: u32,
    last_checked: DateTime<Local>,
    status: SyncStatus,
    log: Vec<String>,
}

/// One mirrored directory pair.
///
/// Shared as `Arc<SyncEntry>` between its owner, its periodic check loop and
/// any listeners. All setters take `&self`; a setter that stores a different
/// value notifies listeners after the internal lock is released.
#[derive(Debug)]
pub struct SyncEntry {
    id: i64,
    state: RwLock<EntryState>,
    listeners: Listeners,
    pass_lock: tokio::sync::Mutex<()>,
    diff_engine: DiffEngine,
    executor: SyncExecutor,
    pub(crate) schedule: Mutex<Option<Arc<ScheduleSlot>>>,
}

impl SyncEntry {
    /// Create an idle entry
    pub fn new(id: i64, config: EntryConfig) -> Result<Self> {
        validate_period(config.period_minutes)?;

        Ok(Self {
            id,
            state: RwLock::new(EntryState {
                source_dir: config.source_dir,
                target_dir: config.target_dir,
                enabled: config.enabled,
                period_minutes: config.period_minutes,
                last_checked: config.last_checked,
                status: SyncStatus::Idle,
                log: Vec::new(),
            }),
            listeners: Listeners::default(),
            pass_lock: tokio::sync::Mutex::new(()),
            diff_engine: DiffEngine::default(),
            executor: SyncExecutor::default(),
            schedule: Mutex::new(None),
        })
    }

    /// Replace the executor, e.g. to run against another filesystem
    pub fn with_executor(mut self, executor: SyncExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_diff_engine(mut self, diff_engine: DiffEngine) -> Self {
        self.diff_engine = diff_engine;
        self
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn source_dir(&self) -> PathBuf {
        self.state.read().source_dir.clone()
    }

    pub fn target_dir(&self) -> PathBuf {
        self.state.read().target_dir.clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.read().enabled
    }

    pub fn period_minutes(&self) -> u32 {
        self.state.read().period_minutes
    }

    pub fn last_checked(&self) -> DateTime<Local> {
        self.state.read().last_checked
    }

    pub fn status(&self) -> SyncStatus {
        self.state.read().status
    }

    /// Lines of the most recent pass
    pub fn log(&self) -> Vec<String> {
        self.state.read().log.clone()
    }

    pub fn last_log_line(&self) -> Option<String> {
        self.state.read().log.last().cloned()
    }

    /// Current configuration, e.g. to copy the entry
    pub fn config(&self) -> EntryConfig {
        let state = self.state.read();
        EntryConfig {
            source_dir: state.source_dir.clone(),
            target_dir: state.target_dir.clone(),
            enabled: state.enabled,
            period_minutes: state.period_minutes,
            last_checked: state.last_checked,
        }
    }

    pub fn set_source_dir(&self, source_dir: impl Into<PathBuf>) {
        self.update(Property::SourceDir, source_dir.into(), |s| &mut s.source_dir);
    }

    pub fn set_target_dir(&self, target_dir: impl Into<PathBuf>) {
        self.update(Property::TargetDir, target_dir.into(), |s| &mut s.target_dir);
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.update(Property::Enabled, enabled, |s| &mut s.enabled);
    }

    pub fn set_period_minutes(&self, period_minutes: u32) -> Result<()> {
        validate_period(period_minutes)?;
        self.update(Property::PeriodMinutes, period_minutes, |s| &mut s.period_minutes);
        Ok(())
    }

    pub fn set_last_checked(&self, last_checked: DateTime<Local>) {
        self.update(Property::LastChecked, last_checked, |s| &mut s.last_checked);
    }

    /// Move to `status`, notifying with the previous and new value
    pub fn set_status(&self, status: SyncStatus) {
        let previous = {
            let mut state = self.state.write();
            if state.status == status {
                return;
            }
            std::mem::replace(&mut state.status, status)
        };
        self.listeners.emit(
            self,
            &EntryEvent::StatusChanged {
                previous,
                current: status,
            },
        );
    }

    /// Register a listener for property and status changes
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&SyncEntry, &EntryEvent) + Send + Sync + 'static,
    {
        self.listeners.add(Arc::new(listener))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.remove(id)
    }

    /// Whether `last_checked + period` lies before `now`
    pub fn is_due(&self, now: DateTime<Local>) -> bool {
        self.next_check() < now
    }

    /// Time of the next automatic check
    pub fn next_check(&self) -> DateTime<Local> {
        let state = self.state.read();
        state.last_checked + ChronoDuration::minutes(i64::from(state.period_minutes))
    }

    /// Status to show to a user: `Stopped` while disabled
    pub fn display_status(&self) -> SyncStatus {
        let state = self.state.read();
        if state.enabled {
            state.status
        } else {
            SyncStatus::Stopped
        }
    }

    pub fn status_text(&self) -> &'static str {
        self.display_status().text()
    }

    /// Coarse age of the last check relative to `now`
    pub fn last_checked_ago(&self, now: DateTime<Local>) -> String {
        let elapsed = now - self.last_checked();
        if elapsed.num_minutes() < 1 {
            "less than a minute".to_string()
        } else if elapsed.num_hours() < 1 {
            plural(elapsed.num_minutes(), "minute")
        } else if elapsed.num_days() < 1 {
            plural(elapsed.num_hours(), "hour")
        } else {
            "more than a day".to_string()
        }
    }

    /// Run one pass: enumerate both trees, apply the differences, record the outcome.
    ///
    /// Fails without touching the log or status when the directories are not
    /// independent or do not exist. Failures of individual operations do not
    /// fail the call; they end the pass in [`SyncStatus::Error`].
    pub async fn sync(&self) -> Result<PassReport> {
        let _pass = self.pass_lock.lock().await;

        let (source_dir, target_dir) = {
            let state = self.state.read();
            (state.source_dir.clone(), state.target_dir.clone())
        };
        check_preconditions(&source_dir, &target_dir)?;

        self.clear_log();
        self.push_log("Syncing started...".to_string());
        self.set_status(SyncStatus::Syncing);

        let report = match self.diff_engine.diff(&source_dir, &target_dir).await {
            Ok(changes) => {
                self.executor
                    .execute(&source_dir, &target_dir, &changes, &mut EntryLog(self))
                    .await
            }
            Err(e) => {
                warn!(entry = self.id, error = %e, "failed to enumerate entries");
                self.push_log(format!("! Failed to enumerate entries: {}", e));
                PassReport {
                    errored: true,
                    ..Default::default()
                }
            }
        };

        self.set_status(if report.errored {
            SyncStatus::Error
        } else {
            SyncStatus::Synced
        });
        self.set_last_checked(Local::now());

        info!(
            entry = self.id,
            removed_files = report.counts.removed_files,
            removed_dirs = report.counts.removed_dirs,
            added_files = report.counts.added_files,
            added_dirs = report.counts.added_dirs,
            updated_files = report.counts.updated_files,
            errored = report.errored,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Sync pass completed"
        );

        Ok(report)
    }

    fn clear_log(&self) {
        let changed = {
            let mut state = self.state.write();
            let had_lines = !state.log.is_empty();
            state.log.clear();
            had_lines
        };
        if changed {
            self.listeners
                .emit(self, &EntryEvent::PropertyChanged(Property::Log));
        }
    }

    fn push_log(&self, line: String) {
        self.state.write().log.push(line);
        self.listeners
            .emit(self, &EntryEvent::PropertyChanged(Property::Log));
    }

    fn update<T, F>(&self, property: Property, value: T, field: F)
    where
        T: PartialEq,
        F: FnOnce(&mut EntryState) -> &mut T,
    {
        let changed = {
            let mut state = self.state.write();
            let slot = field(&mut state);
            if *slot == value {
                false
            } else {
                *slot = value;
                true
            }
        };
        if changed {
            self.listeners
                .emit(self, &EntryEvent::PropertyChanged(property));
        }
    }
}

/// Routes executor output into the entry's observable log
struct EntryLog<'a>(&'a SyncEntry);

impl LogSink for EntryLog<'_> {
    fn push_line(&mut self, line: String) {
        self.0.push_log(line);
    }
}

fn check_preconditions(source_dir: &Path, target_dir: &Path) -> Result<()> {
    if !are_independent(source_dir, target_dir) {
        return Err(SyncError::NotIndependent {
            source_dir: source_dir.to_path_buf(),
            target_dir: target_dir.to_path_buf(),
        });
    }
    for dir in [source_dir, target_dir] {
        if !dir.is_dir() {
            return Err(SyncError::MissingDirectory {
                path: dir.to_path_buf(),
            });
        }
    }
    Ok(())
}

fn validate_period(minutes: u32) -> Result<()> {
    if minutes < MIN_PERIOD_MINUTES {
        return Err(SyncError::InvalidPeriod {
            minutes,
            minimum: MIN_PERIOD_MINUTES,
        });
    }
    Ok(())
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{} {}", count, unit)
    } else {
        format!("{} {}s", count, unit)
    }
}
