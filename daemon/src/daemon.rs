use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mirror::{
    AppSettings, EntryCollection, EntryEvent, EntryStore, MasterSwitch, Property,
    SchedulerOptions, SyncEntry,
};

use crate::config::DaemonConfig;

pub struct MirrorDaemon {
    config: DaemonConfig,
    collection: Arc<EntryCollection>,
    switch: MasterSwitch,
    tasks: Vec<JoinHandle<()>>,
}

impl MirrorDaemon {
    pub async fn new(config: DaemonConfig) -> Result<Self> {
        info!("Initializing mirror daemon");

        config.validate()?;

        let settings_path = config.settings_path();
        let settings = AppSettings::load(&settings_path)
            .await
            .with_context(|| format!("Failed to load {}", settings_path.display()))?;
        let switch = MasterSwitch::from(&settings);

        let entries_path = config.entries_path();
        let collection = EntryCollection::load(EntryStore::new(&entries_path))
            .await
            .with_context(|| format!("Failed to load {}", entries_path.display()))?;

        for entry in collection.entries() {
            mirror_log(&entry);
        }

        info!(
            data_dir = %config.daemon.data_dir.display(),
            entries = collection.len(),
            app_active = switch.is_active(),
            "Mirror daemon initialized"
        );

        Ok(Self {
            config,
            collection,
            switch,
            tasks: Vec::new(),
        })
    }

    pub async fn run(mut self) -> Result<()> {
        info!("Starting mirror daemon");

        let options = SchedulerOptions::with_tick(self.config.scheduler.tick);
        self.collection.start(Arc::new(self.switch.clone()), options)?;
        self.start_settings_refresh_task();

        info!("Mirror daemon started successfully");

        tokio::signal::ctrl_c().await?;
        info!("Ctrl+C received, shutting down");

        self.shutdown().await?;
        info!("Mirror daemon stopped");
        Ok(())
    }

    fn start_settings_refresh_task(&mut self) {
        let switch = self.switch.clone();
        let settings_path = self.config.settings_path();
        let period = self.config.daemon.settings_refresh_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;

            loop {
                interval.tick().await;
                refresh_switch(&switch, &settings_path).await;
            }
        });

        self.tasks.push(handle);
    }

    async fn shutdown(&mut self) -> Result<()> {
        for handle in self.tasks.drain(..) {
            handle.abort();
        }

        self.collection.shutdown().await;
        self.collection.save().await?;
        debug!("Entry list saved");
        Ok(())
    }
}

/// Write every line of the entry's operation log to the tracing output
fn mirror_log(entry: &Arc<SyncEntry>) {
    entry.subscribe(|entry, event| {
        if *event != EntryEvent::PropertyChanged(Property::Log) {
            return;
        }
        if let Some(line) = entry.last_log_line() {
            info!(entry = entry.id(), "{}", line);
        }
    });
}

async fn refresh_switch(switch: &MasterSwitch, settings_path: &Path) {
    match AppSettings::load(settings_path).await {
        Ok(settings) => {
            let previous = switch.set_active(settings.app_active);
            if previous != settings.app_active {
                info!(app_active = settings.app_active, "Application active state changed");
            }
        }
        Err(e) => warn!(error = %e, "Failed to refresh settings"),
    }
}
