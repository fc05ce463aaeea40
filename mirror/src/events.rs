//! Change notifications emitted by a sync entry

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::entry::{SyncEntry, SyncStatus};

/// Observable fields of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    SourceDir,
    TargetDir,
    Enabled,
    PeriodMinutes,
    LastChecked,
    Log,
}

impl Property {
    pub fn name(self) -> &'static str {
        match self {
            Property::SourceDir => "source_dir",
            Property::TargetDir => "target_dir",
            Property::Enabled => "enabled",
            Property::PeriodMinutes => "period_minutes",
            Property::LastChecked => "last_checked",
            Property::Log => "log",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryEvent {
    /// A field took a new, different value
    PropertyChanged(Property),
    /// The engine status moved from one state to another
    StatusChanged {
        previous: SyncStatus,
        current: SyncStatus,
    },
}

/// Handle returned by [`SyncEntry::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&SyncEntry, &EntryEvent) + Send + Sync>;

/// Registered listeners of one entry
#[derive(Default)]
pub(crate) struct Listeners {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Deliver to a snapshot so listeners may subscribe or unsubscribe while running
    pub(crate) fn emit(&self, entry: &SyncEntry, event: &EntryEvent) {
        let snapshot: Vec<Listener> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in snapshot {
            listener(entry, event);
        }
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.listeners.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_names() {
        assert_eq!(Property::SourceDir.name(), "source_dir");
        assert_eq!(Property::PeriodMinutes.to_string(), "period_minutes");
        assert_eq!(
            serde_json::to_string(&Property::LastChecked).unwrap(),
            "\"last_checked\""
        );
    }
}
