use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use mirror::settings::{default_data_dir, ENTRIES_FILE, SETTINGS_FILE};
use mirror::{
    are_independent, AppSettings, EntryCollection, EntryConfig, EntryStore, PassReport,
    SyncEntry, DEFAULT_PERIOD_MINUTES,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mirror")]
#[command(about = "Manage one-way directory mirror entries")]
#[command(version)]
struct Cli {
    /// Directory holding the entry list and settings
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured entries
    List,
    /// Add an entry mirroring SOURCE onto TARGET
    Add {
        source: PathBuf,
        target: PathBuf,
        /// Re-check period in minutes
        #[arg(long, default_value_t = DEFAULT_PERIOD_MINUTES)]
        period: u32,
        /// Add the entry without automatic re-checks
        #[arg(long)]
        disabled: bool,
    },
    /// Remove an entry; its directories are left untouched
    Remove { id: i64 },
    /// Turn on automatic re-checks for an entry
    Enable { id: i64 },
    /// Turn off automatic re-checks for an entry
    Disable { id: i64 },
    /// Change the re-check period of an entry
    SetPeriod { id: i64, minutes: u32 },
    /// Change the source and/or target directory of an entry
    SetDirs {
        id: i64,
        #[arg(long)]
        source: Option<PathBuf>,
        #[arg(long)]
        target: Option<PathBuf>,
    },
    /// Run one pass of an entry now
    Run { id: i64 },
    /// Mirror SOURCE onto TARGET once without saving an entry
    Once { source: PathBuf, target: PathBuf },
    /// Stop automatic re-checks application-wide
    Pause,
    /// Resume automatic re-checks application-wide
    Resume,
    /// Show application state
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);

    match cli.command {
        Commands::List => {
            let collection = load_collection(&data_dir).await?;
            list(&collection);
        }
        Commands::Add {
            source,
            target,
            period,
            disabled,
        } => {
            for dir in [&source, &target] {
                if !dir.is_dir() {
                    println!("⚠ {} does not exist yet", dir.display());
                }
            }
            let id = add_entry(&data_dir, source, target, period, disabled).await?;
            println!("Added entry #{}", id);
        }
        Commands::Remove { id } => {
            remove_entry(&data_dir, id).await?;
            println!("Removed entry #{}", id);
        }
        Commands::Enable { id } => {
            update(&data_dir, id, |entry| {
                entry.set_enabled(true);
                Ok(())
            })
            .await?;
            println!("Updated entry #{}", id);
        }
        Commands::Disable { id } => {
            update(&data_dir, id, |entry| {
                entry.set_enabled(false);
                Ok(())
            })
            .await?;
            println!("Updated entry #{}", id);
        }
        Commands::SetPeriod { id, minutes } => {
            update(&data_dir, id, |entry| {
                entry.set_period_minutes(minutes)?;
                Ok(())
            })
            .await?;
            println!("Updated entry #{}", id);
        }
        Commands::SetDirs { id, source, target } => {
            set_dirs(&data_dir, id, source, target).await?;
            println!("Updated entry #{}", id);
        }
        Commands::Run { id } => {
            let (report, log) = run_entry(&data_dir, id).await?;
            print_and_exit(&report, &log);
        }
        Commands::Once { source, target } => {
            let (report, log) = mirror::sync_directories(&source, &target).await?;
            print_and_exit(&report, &log);
        }
        Commands::Pause => set_active(&data_dir, false).await?,
        Commands::Resume => set_active(&data_dir, true).await?,
        Commands::Status => {
            let settings = AppSettings::load(&data_dir.join(SETTINGS_FILE)).await?;
            let collection = load_collection(&data_dir).await?;
            println!("Data directory: {}", data_dir.display());
            println!(
                "Automatic syncs: {}",
                if settings.app_active { "active" } else { "paused" }
            );
            println!(
                "Entries: {} ({} enabled)",
                collection.len(),
                collection.entries().iter().filter(|e| e.is_enabled()).count()
            );
        }
    }

    Ok(())
}

async fn load_collection(data_dir: &Path) -> Result<Arc<EntryCollection>> {
    let path = data_dir.join(ENTRIES_FILE);
    EntryCollection::load(EntryStore::new(&path))
        .await
        .with_context(|| format!("Failed to load {}", path.display()))
}

fn find(collection: &EntryCollection, id: i64) -> Result<Arc<SyncEntry>> {
    collection
        .get(id)
        .with_context(|| format!("No entry with id {}", id))
}

async fn add_entry(
    data_dir: &Path,
    source: PathBuf,
    target: PathBuf,
    period: u32,
    disabled: bool,
) -> Result<i64> {
    let collection = load_collection(data_dir).await?;
    let config = EntryConfig::new(source, target)
        .enabled(!disabled)
        .period_minutes(period);
    let entry = collection.add(config).await?;
    info!(entry = entry.id(), "Entry added");
    Ok(entry.id())
}

async fn remove_entry(data_dir: &Path, id: i64) -> Result<()> {
    let collection = load_collection(data_dir).await?;
    match collection.remove(id).await? {
        Some(_) => Ok(()),
        None => bail!("No entry with id {}", id),
    }
}

async fn update<F>(data_dir: &Path, id: i64, change: F) -> Result<()>
where
    F: FnOnce(&SyncEntry) -> Result<()>,
{
    let collection = load_collection(data_dir).await?;
    let entry = find(&collection, id)?;
    change(&entry)?;
    collection.save().await?;
    Ok(())
}

/// Replace the directories of an entry; omitted ones keep their value
async fn set_dirs(
    data_dir: &Path,
    id: i64,
    source: Option<PathBuf>,
    target: Option<PathBuf>,
) -> Result<()> {
    update(data_dir, id, |entry| {
        let source = source.unwrap_or_else(|| entry.source_dir());
        let target = target.unwrap_or_else(|| entry.target_dir());
        if !are_independent(&source, &target) {
            bail!(
                "{} and {} must not contain each other",
                source.display(),
                target.display()
            );
        }
        entry.set_source_dir(source);
        entry.set_target_dir(target);
        Ok(())
    })
    .await
}

/// Run one pass of a saved entry and persist its new check time
async fn run_entry(data_dir: &Path, id: i64) -> Result<(PassReport, Vec<String>)> {
    let collection = load_collection(data_dir).await?;
    let entry = find(&collection, id)?;
    let report = entry.sync().await?;
    collection.save().await?;
    Ok((report, entry.log()))
}

async fn set_active(data_dir: &Path, active: bool) -> Result<()> {
    let settings = AppSettings { app_active: active };
    settings.save(&data_dir.join(SETTINGS_FILE)).await?;
    println!(
        "Automatic syncs {}",
        if active { "resumed" } else { "paused" }
    );
    Ok(())
}

fn list(collection: &EntryCollection) {
    if collection.is_empty() {
        println!("No entries configured");
        return;
    }

    let now = Local::now();
    for entry in collection.entries() {
        println!(
            "#{:<4} {:<16} every {} min, checked {} ago",
            entry.id(),
            entry.status_text(),
            entry.period_minutes(),
            entry.last_checked_ago(now)
        );
        println!(
            "      {} -> {}",
            entry.source_dir().display(),
            entry.target_dir().display()
        );
    }
}

/// Process exit code for a finished pass
fn exit_code(report: &PassReport) -> i32 {
    if report.errored {
        1
    } else {
        0
    }
}

fn print_and_exit(report: &PassReport, log: &[String]) {
    for line in log {
        println!("{}", line);
    }
    let code = exit_code(report);
    if code != 0 {
        std::process::exit(code);
    }
}
