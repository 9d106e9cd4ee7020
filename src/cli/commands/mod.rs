//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod extract;
mod process;
mod schema;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{FileConfig, Settings};

#[derive(Parser)]
#[command(name = "invoice-capture")]
#[command(about = "Extract invoice fields with Document AI into BigQuery")]
#[command(version)]
pub struct Cli {
    /// TOML config file; environment variables override its values
    #[arg(short, long, global = true, env = "INVOICE_CAPTURE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP trigger for storage events
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT
        #[arg(env = "PORT", default_value = "8080")]
        bind: String,
    },

    /// Process one uploaded object, as if its upload event had arrived
    Process {
        /// Object name, or a full gs://bucket/name URI
        #[arg(short, long)]
        name: String,
        /// Input bucket (default: {project}-input-invoices)
        #[arg(short, long)]
        bucket: Option<String>,
        /// Content type (default: guessed from the object name)
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Extract fields from a local Document AI JSON file without touching any service
    Extract {
        /// Document JSON written by the processor
        file: PathBuf,
        /// Value for the input_file_name column (default: derived from the file name)
        #[arg(long)]
        input_file_name: Option<String>,
    },

    /// Print the destination table schema as BigQuery JSON
    Schema,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { bind } => {
            let settings = Settings::load(config_path)?;
            serve::cmd_serve(&settings, &bind).await
        }
        Commands::Process {
            name,
            bucket,
            content_type,
        } => {
            let settings = Settings::load(config_path)?;
            process::cmd_process(&settings, &name, bucket, content_type).await
        }
        Commands::Extract {
            file,
            input_file_name,
        } => {
            let file_config = match config_path {
                Some(path) => FileConfig::read(path)?,
                None => FileConfig::default(),
            };
            extract::cmd_extract(&file_config, &file, input_file_name)
        }
        Commands::Schema => schema::cmd_schema(),
    }
}
