//! Mayoreo CLI - distributor to storefront catalog sync.
//!
//! # Usage
//!
//! ```bash
//! # Run the catalog sync (reads configuration from the environment / .env)
//! mayoreo sync
//!
//! # Probe the distributor's exchange rate
//! mayoreo rate
//! ```
//!
//! # Commands
//!
//! - `sync` - Walk the distributor listing and upsert products into the store
//! - `rate` - Print the distributor's current exchange rate quotes

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "mayoreo")]
#[command(author, version, about = "Distributor to storefront catalog sync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the catalog sync
    Sync,
    /// Probe the distributor's exchange rate
    Rate,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Sync => commands::sync::run().await?,
        Commands::Rate => commands::rate::run().await?,
    }
    Ok(())
}
