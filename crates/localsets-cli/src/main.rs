//! localsets CLI
//!
//! Look up random battle and Smogon sets from the local cache, refreshing it
//! from the upstream repositories when asked.

mod commands;
mod display;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use localsets_core::Format;

#[derive(Parser)]
#[command(name = "localsets", version)]
#[command(about = "Offline Pokemon random battle and Smogon set lookup", long_about = None)]
pub(crate) struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Cache directory (overrides the config file and LOCALSETS_CACHE_DIR)
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Never refresh stale data on startup
    #[arg(long, global = true)]
    pub no_refresh: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Show the set data for a Pokemon
    Get {
        /// Pokemon name, any spelling (e.g. "Mr. Mime", mrmime)
        name: String,

        /// Format to look in; defaults to the most recent random battle format
        #[arg(short, long)]
        format: Option<Format>,

        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the Pokemon available in a format or alias group
    List {
        /// Format id or alias (e.g. gen9randombattle, modern, gen8)
        #[arg(short, long, default_value = "gen9randombattle")]
        format: String,

        /// Only print the number of Pokemon
        #[arg(long)]
        count: bool,
    },

    /// Refresh cached data from the upstream repositories
    Update {
        /// Format ids or aliases (e.g. gen9randombattle,smogon)
        #[arg(short, long, value_delimiter = ',')]
        format: Vec<String>,

        /// Refresh every known format, random battle and Smogon
        #[arg(long, conflicts_with = "format")]
        all: bool,

        /// Rewrite data even when it has not changed
        #[arg(long)]
        force: bool,
    },

    /// Show what is cached and when it was last refreshed
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List every known format and alias
    Formats,

    /// Find a Pokemon in every loaded format
    Search {
        name: String,
    },

    /// Show usage statistics for a Pokemon
    Stats {
        name: String,

        #[arg(short, long, default_value = "gen9randombattle")]
        format: Format,
    },
}

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: bool) {
    // RUST_LOG wins over --verbose when set
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!("localsets starting");

    commands::run(cli).await
}
