//! The owned set of entries: persistence and scheduler lifecycle

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::entry::{EntryConfig, SyncEntry, MIN_PERIOD_MINUTES};
use crate::error::{Result, SyncError};
use crate::events::{EntryEvent, Property, SubscriptionId};
use crate::paths::are_independent;
use crate::scheduler::{ActivityGate, SchedulerOptions};
use crate::store::{EntryRecord, EntryStore};

struct Member {
    entry: Arc<SyncEntry>,
    subscription: SubscriptionId,
    check: Option<JoinHandle<()>>,
}

#[derive(Clone)]
struct Scheduling {
    gate: Arc<dyn ActivityGate>,
    options: SchedulerOptions,
}

/// Ordered collection of entries backed by an [`EntryStore`].
///
/// Any change to a persisted field of a member schedules a background save.
/// Once [`EntryCollection::start`] was called, every member, including ones
/// added later, runs its periodic check.
pub struct EntryCollection {
    store: EntryStore,
    members: RwLock<Vec<Member>>,
    scheduling: Mutex<Option<Scheduling>>,
}

impl std::fmt::Debug for EntryCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryCollection")
            .field("store", &self.store)
            .field("len", &self.members.read().len())
            .field("scheduling", &self.scheduling.lock().is_some())
            .finish()
    }
}

impl EntryCollection {
    /// Restore the entries persisted in `store`
    pub async fn load(store: EntryStore) -> Result<Arc<Self>> {
        let records = store.load().await?;
        let collection = Arc::new(Self {
            store,
            members: RwLock::new(Vec::with_capacity(records.len())),
            scheduling: Mutex::new(None),
        });

        for record in records {
            let mut config = record.config();
            if config.period_minutes < MIN_PERIOD_MINUTES {
                warn!(
                    entry = record.id,
                    period_minutes = config.period_minutes,
                    "Period below minimum, using {} minute(s)",
                    MIN_PERIOD_MINUTES
                );
                config.period_minutes = MIN_PERIOD_MINUTES;
            }
            let entry = Arc::new(SyncEntry::new(record.id, config)?);
            collection.attach(entry);
        }

        info!(
            path = %collection.store.path().display(),
            count = collection.len(),
            "Loaded entry collection"
        );
        Ok(collection)
    }

    /// Start the periodic check of every member and of members added later
    pub fn start(&self, gate: Arc<dyn ActivityGate>, options: SchedulerOptions) -> Result<()> {
        let scheduling = Scheduling { gate, options };
        *self.scheduling.lock() = Some(scheduling.clone());

        let mut members = self.members.write();
        for member in members.iter_mut() {
            if !member.entry.is_scheduled() {
                member.check = Some(
                    member
                        .entry
                        .start_periodic_check(Arc::clone(&scheduling.gate), scheduling.options)?,
                );
            }
        }
        Ok(())
    }

    /// Create a new entry with the next free id, schedule it if running, and save
    pub async fn add(self: &Arc<Self>, config: EntryConfig) -> Result<Arc<SyncEntry>> {
        if !are_independent(&config.source_dir, &config.target_dir) {
            return Err(SyncError::NotIndependent {
                source_dir: config.source_dir,
                target_dir: config.target_dir,
            });
        }

        let id = self.next_id();
        let entry = Arc::new(SyncEntry::new(id, config)?);
        self.attach(Arc::clone(&entry));

        let scheduling = self.scheduling.lock().clone();
        if let Some(scheduling) = scheduling {
            let check = entry.start_periodic_check(scheduling.gate, scheduling.options)?;
            if let Some(member) = self
                .members
                .write()
                .iter_mut()
                .find(|member| member.entry.id() == id)
            {
                member.check = Some(check);
            }
        }

        info!(entry = id, "Added entry");
        self.save().await?;
        Ok(entry)
    }

    /// Stop and drop an entry, waiting for a running pass to finish.
    /// Its directories are left untouched.
    pub async fn remove(&self, id: i64) -> Result<Option<Arc<SyncEntry>>> {
        let member = {
            let mut members = self.members.write();
            members
                .iter()
                .position(|member| member.entry.id() == id)
                .map(|index| members.remove(index))
        };

        let Some(member) = member else {
            return Ok(None);
        };

        member.entry.unsubscribe(member.subscription);
        member.entry.dispose();
        if let Some(check) = member.check {
            join_check(id, check).await;
        }
        info!(entry = id, "Removed entry");

        self.save().await?;
        Ok(Some(member.entry))
    }

    pub fn get(&self, id: i64) -> Option<Arc<SyncEntry>> {
        self.members
            .read()
            .iter()
            .find(|member| member.entry.id() == id)
            .map(|member| Arc::clone(&member.entry))
    }

    /// Members in insertion order
    pub fn entries(&self) -> Vec<Arc<SyncEntry>> {
        self.members
            .read()
            .iter()
            .map(|member| Arc::clone(&member.entry))
            .collect()
    }

    pub fn records(&self) -> Vec<EntryRecord> {
        self.members
            .read()
            .iter()
            .map(|member| EntryRecord::from(member.entry.as_ref()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.members.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.read().is_empty()
    }

    /// Persist the members as they are once the store is free
    pub async fn save(&self) -> Result<()> {
        self.store.save_with(|| self.records()).await
    }

    /// Stop every periodic check and wait for running passes to finish
    pub async fn shutdown(&self) {
        *self.scheduling.lock() = None;

        let checks: Vec<_> = {
            let mut members = self.members.write();
            members
                .iter_mut()
                .filter_map(|member| {
                    member.entry.dispose();
                    member.check.take().map(|check| (member.entry.id(), check))
                })
                .collect()
        };

        for (id, check) in checks {
            join_check(id, check).await;
        }
        info!("Entry collection shut down");
    }

    fn next_id(&self) -> i64 {
        self.members
            .read()
            .iter()
            .map(|member| member.entry.id())
            .max()
            .map_or(1, |max| max + 1)
    }

    fn attach(self: &Arc<Self>, entry: Arc<SyncEntry>) {
        let collection = Arc::downgrade(self);
        let subscription = entry.subscribe(move |entry, event| {
            if is_persisted(event) {
                spawn_save(&collection, entry.id());
            }
        });
        self.members.write().push(Member {
            entry,
            subscription,
            check: None,
        });
    }
}

async fn join_check(id: i64, check: JoinHandle<()>) {
    if let Err(e) = check.await {
        warn!(entry = id, error = %e, "Periodic check ended abnormally");
    }
}

fn is_persisted(event: &EntryEvent) -> bool {
    match event {
        EntryEvent::PropertyChanged(property) => !matches!(property, Property::Log),
        EntryEvent::StatusChanged { .. } => false,
    }
}

fn spawn_save(collection: &Weak<EntryCollection>, id: i64) {
    let Some(collection) = collection.upgrade() else {
        return;
    };
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        debug!(entry = id, "No runtime, change not saved");
        return;
    };

    runtime.spawn(async move {
        if let Err(e) = collection.save().await {
            error!(entry = id, error = %e, "Failed to save entries");
        }
    });
}
