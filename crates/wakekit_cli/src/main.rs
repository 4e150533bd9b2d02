//! WakeKit CLI
//!
//! Command-line tools for WakeKit data directories.
//!
//! # Commands
//!
//! - `init` - Create a data directory
//! - `inspect` - Display the wake record, event backlog and settings
//! - `add-event` - Append an event to the backlog
//! - `pack` - Build upload payloads
//! - `settings` - Read and change settings

mod commands;
mod error;

use clap::{Parser, Subcommand};
use commands::pack::PackOptions;
use commands::settings::SettingsAction;
use error::{CliError, CliResult};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// WakeKit command-line tools.
#[derive(Parser)]
#[command(name = "wakekit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a data directory
    Init,

    /// Display the wake record, event backlog and settings
    Inspect {
        /// Print the settings values
        #[arg(short, long)]
        settings: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Append a JSON object to the event backlog
    AddEvent {
        /// Event as a JSON object
        json: String,

        /// Maximum serialized event size in bytes
        #[arg(short, long)]
        max_size: Option<usize>,
    },

    /// Build upload payloads and print one per line
    Pack {
        /// Payload size budget in bytes
        #[arg(short, long)]
        max_size: Option<usize>,

        /// Wake reason code
        #[arg(long)]
        wake_reason: Option<i64>,

        /// Reset reason
        #[arg(long)]
        reset_reason: Option<String>,

        /// Time to connect in milliseconds
        #[arg(long)]
        time_to_connect: Option<u64>,

        /// Extra field as key=value, repeatable
        #[arg(short, long = "field")]
        fields: Vec<String>,
    },

    /// Read and change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },

    /// Show version information
    Version,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    // Logs go to stderr so payloads on stdout stay clean
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => {
            let path = cli.path.ok_or(CliError::PathRequired("init"))?;
            commands::init::run(&path)?;
        }
        Commands::Inspect { settings, format } => {
            let path = cli.path.ok_or(CliError::PathRequired("inspect"))?;
            commands::inspect::run(&path, settings, &format)?;
        }
        Commands::AddEvent { json, max_size } => {
            let path = cli.path.ok_or(CliError::PathRequired("add-event"))?;
            commands::add_event::run(&path, &json, max_size)?;
        }
        Commands::Pack {
            max_size,
            wake_reason,
            reset_reason,
            time_to_connect,
            fields,
        } => {
            let path = cli.path.ok_or(CliError::PathRequired("pack"))?;
            let options = PackOptions {
                max_size,
                wake_reason,
                reset_reason,
                time_to_connect,
                fields,
            };
            commands::pack::run(&path, &options)?;
        }
        Commands::Settings { action } => {
            let path = cli.path.ok_or(CliError::PathRequired("settings"))?;
            commands::settings::run(&path, &action)?;
        }
        Commands::Version => {
            println!("WakeKit CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("WakeKit Core v{}", wakekit_core::VERSION);
        }
    }

    Ok(())
}
