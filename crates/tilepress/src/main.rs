//! Tilepress CLI - Photo tile editing and export pipeline.
//!
//! Tilepress takes a photo collection as input and walks it photo by photo:
//! framing each one through a square crop window, applying an optional filter,
//! and exporting a shareable preview plus a full-resolution print master.
//! Every change leaves the tool as a patch record on stdout or in a file.
//!
//! # Usage
//!
//! ```bash
//! # Export tiles for an order manifest
//! tilepress process order.json --output patches.jsonl --format jsonl
//!
//! # Export every photo in a directory with the noir filter
//! tilepress process ./photos/ --filter noir
//!
//! # List the built-in filter catalog
//! tilepress filters
//!
//! # View configuration
//! tilepress config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Tilepress - Photo tile editing and export pipeline.
#[derive(Parser, Debug)]
#[command(name = "tilepress")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Edit and export a photo collection into square tiles
    Process(cli::process::ProcessArgs),

    /// List the built-in filter catalog
    Filters(cli::filters::FiltersArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging from config, with CLI verbose override.
    // Note: logging isn't initialized yet, so use eprintln for config warnings.
    let config = match tilepress_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `tilepress config path`."
            );
            tilepress_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Tilepress v{}", tilepress_core::VERSION);

    // Dispatch to the appropriate command handler
    match cli.command {
        Commands::Process(args) => cli::process::execute(args).await,
        Commands::Filters(args) => cli::filters::execute(args).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
