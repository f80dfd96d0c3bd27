//! # Credential Import CLI (`credimport`)
//!
//! ## Usage
//!
//! ```bash
//! credimport --config ./config/credimport.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `credimport init` | Create the SQLite database and run schema migrations |
//! | `credimport validate <file>` | Check a CSV file without writing anything |
//! | `credimport import <file>` | Validate and import a CSV file |
//! | `credimport stats` | Show record counts |
//!
//! Log verbosity follows `RUST_LOG` (default `warn`); logs go to stderr.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use credential_import::{config, ingest, migrate, stats};

/// Import credential CSV files into a SQLite credential database.
#[derive(Parser)]
#[command(
    name = "credimport",
    about = "Import credential CSV files into a SQLite credential database",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/credimport.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Validate a CSV file without importing it.
    ///
    /// Exits non-zero when the file has errors.
    Validate {
        file: PathBuf,

        /// Private type for short-form files (password, ntlm_hash, nonreplayable_hash).
        #[arg(long)]
        private_type: Option<String>,

        /// Print the validation report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Validate and import a CSV file.
    Import {
        file: PathBuf,

        /// Private type for short-form files (password, ntlm_hash, nonreplayable_hash).
        #[arg(long)]
        private_type: Option<String>,

        /// Origin recorded on created cores. Defaults to the file name.
        #[arg(long)]
        origin: Option<String>,
    },

    /// Show record counts.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Validate {
            file,
            private_type,
            json,
        } => {
            ingest::run_validate(&cfg, &file, private_type, json).await?;
        }
        Commands::Import {
            file,
            private_type,
            origin,
        } => {
            ingest::run_import(&cfg, &file, private_type, origin).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
    }

    Ok(())
}
