//! ach-files CLI - Main entry point

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use ach_files::config::AchConfig;
use ach_files::routing::calculate_check_digit;
use ach_files::{ContentKind, FileService};
use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ach-files")]
#[command(about = "Validate, store and serve ACH files", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a new ACH file
    Create {
        /// Path of the file to submit
        path: PathBuf,
        /// Read the file as JSON instead of flat NACHA text
        #[arg(long)]
        json: bool,
    },

    /// List stored files
    List,

    /// Show one stored file as JSON
    Get {
        id: String,
    },

    /// Print a stored file's contents
    Contents {
        id: String,
        /// Render as JSON instead of flat NACHA text
        #[arg(long)]
        json: bool,
    },

    /// Re-run validation against a stored file
    Validate {
        id: String,
    },

    /// Delete a stored file
    Delete {
        id: String,
    },

    /// Compute the check digit for an 8-digit routing number
    CheckDigit {
        routing_number: String,
    },
}

fn content_kind(json: bool) -> ContentKind {
    if json { ContentKind::Json } else { ContentKind::Flat }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AchConfig::load_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AchConfig::default(),
    };

    // RUST_LOG wins over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log.filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::CheckDigit { routing_number } => {
            let digit = calculate_check_digit(&routing_number)
                .with_context(|| format!("{routing_number:?} is not an 8-digit routing number"))?;
            println!("{routing_number}{digit}");
        }

        Commands::Create { path, json } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let id = with_service(&config, |service| {
                Ok(service.submit(&bytes, content_kind(json).content_type())?)
            })?;
            println!("{id}");
        }

        Commands::List => {
            for file in with_service(&config, |service| Ok(service.get_files()?))? {
                println!(
                    "{}\torigin={}\tdestination={}\tbatches={}\tiat_batches={}",
                    file.id,
                    file.origin(),
                    file.destination(),
                    file.batches.len(),
                    file.iat_batches.len()
                );
            }
        }

        Commands::Get { id } => {
            let file = with_service(&config, |service| Ok(service.get_file(&id)?))?;
            println!("{}", serde_json::to_string_pretty(&file)?);
        }

        Commands::Contents { id, json } => {
            let contents = with_service(&config, |service| {
                Ok(service.get_file_contents(&id, content_kind(json))?)
            })?;
            std::io::stdout().write_all(&contents)?;
        }

        Commands::Validate { id } => {
            with_service(&config, |service| Ok(service.validate_file(&id)?))?;
            println!("{id} is valid");
        }

        Commands::Delete { id } => {
            with_service(&config, |service| Ok(service.delete_file(&id)?))?;
            println!("{id} deleted");
        }
    }

    Ok(())
}

/// Opens the configured store, runs one service call and flushes.
///
/// Counters only live as long as the process, so the CLI keeps the service's
/// no-op metrics.
fn with_service<T>(
    config: &AchConfig,
    call: impl FnOnce(&FileService) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let store = config.open_store().context("opening file store")?;
    let service = FileService::new(Arc::new(store.clone())).with_clock(Arc::new(config.clock()?));

    let result = call(&service)?;
    store.flush()?;
    Ok(result)
}
