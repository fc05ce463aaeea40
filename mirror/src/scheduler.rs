//! Per-entry periodic check loop
//!
//! Every entry owns at most one loop. The loop wakes up once per tick, asks
//! the [`ActivityGate`] whether automatic syncs are allowed, and runs
//! [`SyncEntry::sync`] when the entry is due or a manual request is pending.
//! Cancellation interrupts the sleep, never a running pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::entry::{SyncEntry, SyncStatus};
use crate::error::{Result, SyncError};

/// Default due-check resolution
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

/// Application-wide switch consulted on every tick
pub trait ActivityGate: Send + Sync {
    fn is_active(&self) -> bool;
}

impl<F> ActivityGate for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_active(&self) -> bool {
        self()
    }
}

/// Loop tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    pub tick: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self { tick: DEFAULT_TICK }
    }
}

impl SchedulerOptions {
    pub fn with_tick(tick: Duration) -> Self {
        Self { tick }
    }
}

/// Handle shared between an entry and its running loop
#[derive(Debug, Default)]
pub(crate) struct ScheduleSlot {
    token: CancellationToken,
    force: AtomicBool,
}

impl SyncEntry {
    /// Spawn the periodic check loop on the current tokio runtime.
    ///
    /// Fails with [`SyncError::AlreadyScheduled`] while another loop is running.
    pub fn start_periodic_check(
        self: &Arc<Self>,
        gate: Arc<dyn ActivityGate>,
        options: SchedulerOptions,
    ) -> Result<JoinHandle<()>> {
        let slot = {
            let mut schedule = self.schedule.lock();
            if schedule.is_some() {
                return Err(SyncError::AlreadyScheduled { id: self.id() });
            }
            let slot = Arc::new(ScheduleSlot::default());
            *schedule = Some(Arc::clone(&slot));
            slot
        };

        info!(
            entry = self.id(),
            tick_ms = options.tick.as_millis() as u64,
            "Starting periodic check"
        );

        let entry = Arc::clone(self);
        Ok(tokio::spawn(async move {
            entry.periodic_check(slot, gate, options.tick).await;
        }))
    }

    /// Cancel the running loop. Returns false if none was running.
    pub fn stop_periodic_check(&self) -> bool {
        let slot = self.schedule.lock().take();
        match slot {
            Some(slot) => {
                slot.token.cancel();
                info!(entry = self.id(), "Stopping periodic check");
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.schedule.lock().is_some()
    }

    /// Request a sync on the next tick, bypassing the due check, the enabled
    /// flag and the activity gate.
    ///
    /// Only honored while the loop runs; returns whether the request was armed.
    pub fn schedule_sync(&self) -> bool {
        let slot = self.schedule.lock().clone();
        match slot {
            Some(slot) => {
                self.set_status(SyncStatus::Idle);
                slot.force.store(true, Ordering::SeqCst);
                debug!(entry = self.id(), "Manual sync requested");
                true
            }
            None => false,
        }
    }

    /// Release the scheduler. Files are left untouched.
    pub fn dispose(&self) {
        self.stop_periodic_check();
    }

    async fn periodic_check(
        &self,
        slot: Arc<ScheduleSlot>,
        gate: Arc<dyn ActivityGate>,
        tick: Duration,
    ) {
        let mut last_failure: Option<String> = None;

        loop {
            tokio::select! {
                _ = slot.token.cancelled() => break,
                _ = sleep(tick) => {}
            }

            let forced = slot.force.swap(false, Ordering::SeqCst);
            if !forced && !gate.is_active() {
                continue;
            }
            if !forced && !(self.is_enabled() && self.is_due(Local::now())) {
                continue;
            }

            match self.sync().await {
                Ok(_) => last_failure = None,
                Err(e) => {
                    let message = e.to_string();
                    if last_failure.as_deref() == Some(message.as_str()) {
                        debug!(entry = self.id(), error = %message, "sync still failing");
                    } else {
                        warn!(entry = self.id(), error = %message, "sync failed");
                    }
                    last_failure = Some(message);
                }
            }
        }

        let mut schedule = self.schedule.lock();
        if schedule
            .as_ref()
            .map_or(false, |current| Arc::ptr_eq(current, &slot))
        {
            *schedule = None;
        }
        debug!(entry = self.id(), "Periodic check stopped");
    }
}
