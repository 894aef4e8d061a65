//! CLI - Command Line Interface
//!
//! Available Commands:
//! - dex serve   - Run the HTTP API
//! - dex import  - Run one import against the configured feed or a local file
//!
//! Settings come from the config file, then `DEX_*` environment variables,
//! then the flags below.

use clap::{Args, Parser, Subcommand};
use dex_core::config::ConfigError;
use dex_core::{ImportMode, ServiceConfig};
use dex_runtime::{EntrySource, FileEntrySource, HttpEntrySource, Importer};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use crate::daemon::{AppState, open_store, run_daemon};

/// CLI Errors
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Source error: {0}")]
    SourceError(String),

    #[error("Import failed: {0}")]
    ImportError(String),

    #[error("Server error: {0}")]
    ServerError(String),
}

/// Dex records service
#[derive(Parser, Debug)]
#[command(name = "dex")]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Config file (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Commands {
    /// Run the HTTP API
    Serve(ServeArgs),

    /// Import entries once and exit
    Import(ImportArgs),
}

#[derive(Args, Debug)]
pub(crate) struct ServeArgs {
    /// Listen address
    #[arg(short, long)]
    pub address: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// Read entries from a local JSON file instead of the configured URL
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Write mode (upsert or bulk)
    #[arg(short, long)]
    pub mode: Option<ImportMode>,
}

/// Parse CLI arguments and execute commands
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = ServiceConfig::load(cli.config.as_deref())?;
    apply_flags(&mut config, &cli);

    match cli.command {
        Commands::Serve(_) => cmd_serve(&config).await,
        Commands::Import(args) => cmd_import(args, &config).await,
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    // Logs go to stderr so `dex import` output stays machine-readable
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Flags win over file and environment settings
pub(crate) fn apply_flags(config: &mut ServiceConfig, cli: &Cli) {
    if let Some(database) = &cli.database {
        config.storage.db_path = database.clone();
    }
    match &cli.command {
        Commands::Serve(args) => {
            if let Some(address) = &args.address {
                config.server.address = address.clone();
            }
        }
        Commands::Import(args) => {
            if let Some(mode) = args.mode {
                config.import.mode = mode;
            }
        }
    }
}

async fn cmd_serve(config: &ServiceConfig) -> Result<(), CliError> {
    let address: SocketAddr = config
        .server
        .address
        .parse()
        .map_err(|e: std::net::AddrParseError| CliError::ServerError(e.to_string()))?;

    info!(database = %config.storage.db_path.display(), "Opening record store");
    let state = AppState::from_config(config).await?;

    run_daemon(
        address,
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    )
    .await
}

async fn cmd_import(args: ImportArgs, config: &ServiceConfig) -> Result<(), CliError> {
    let source: Box<dyn EntrySource> = match args.file {
        Some(path) => Box::new(FileEntrySource::new(path)),
        None => Box::new(
            HttpEntrySource::from_config(&config.import)
                .map_err(|e| CliError::SourceError(e.to_string()))?,
        ),
    };

    let importer = Importer::new(open_store(config).await?, config.import.mode);
    let report = importer
        .load_from(source.as_ref())
        .await
        .map_err(|e| CliError::ImportError(e.to_string()))?;

    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|e| CliError::ImportError(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}
