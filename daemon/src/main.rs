use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

mod config;
mod daemon;
mod telemetry;

use config::DaemonConfig;
use daemon::MirrorDaemon;

#[derive(Parser)]
#[command(name = "mirror-daemon")]
#[command(about = "Runs the periodic checks of every configured mirror entry")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the data directory holding the entry list and settings
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the configured log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the daemon in the foreground until Ctrl+C
    Start,
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigActions,
    },
}

#[derive(Subcommand)]
enum ConfigActions {
    /// Validate configuration file
    Validate,
    /// Show current configuration
    Show,
    /// Generate default configuration
    Generate {
        /// Output path for configuration
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start => {
            let mut config = load_config(cli.config.as_ref()).await?;
            if let Some(data_dir) = cli.data_dir {
                config.daemon.data_dir = data_dir;
            }
            if let Some(log_level) = cli.log_level {
                config.daemon.log_level = log_level;
            }

            let _guard = telemetry::initialize_logging(
                &config.daemon.log_level,
                config.daemon.log_file.as_ref(),
            )?;

            let daemon = MirrorDaemon::new(config).await?;
            daemon.run().await
        }
        Commands::Config { action } => match action {
            ConfigActions::Validate => validate_config(cli.config.as_ref()).await,
            ConfigActions::Show => show_config(cli.config.as_ref()).await,
            ConfigActions::Generate { output } => generate_config(output.as_ref()).await,
        },
    }
}

async fn load_config(config_path: Option<&PathBuf>) -> Result<DaemonConfig> {
    match config_path {
        Some(path) => {
            let config = DaemonConfig::load(path).await?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => Ok(DaemonConfig::default()),
    }
}

async fn validate_config(config_path: Option<&PathBuf>) -> Result<()> {
    let path = config_path
        .cloned()
        .unwrap_or_else(|| PathBuf::from("mirror-daemon.toml"));

    match DaemonConfig::load(&path).await.and_then(|config| {
        config.validate()?;
        Ok(config)
    }) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("Data directory: {}", config.daemon.data_dir.display());
            println!("Scheduler tick: {:?}", config.scheduler.tick);
            Ok(())
        }
        Err(e) => {
            println!("✗ Configuration validation failed: {:#}", e);
            Err(e)
        }
    }
}

async fn show_config(config_path: Option<&PathBuf>) -> Result<()> {
    let config = load_config(config_path).await?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

async fn generate_config(output_path: Option<&PathBuf>) -> Result<()> {
    let config = DaemonConfig::default();

    if let Some(path) = output_path {
        config.save(path).await?;
        println!("Configuration generated at {}", path.display());
    } else {
        println!("{}", toml::to_string_pretty(&config)?);
    }

    Ok(())
}
