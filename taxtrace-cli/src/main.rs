//! TaxTrace CLI
//!
//! Drive barcode-scan sessions from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # List capture devices and the one that would be chosen
//! taxtrace devices
//!
//! # Run a scan session against a scripted backend
//! taxtrace scan --scenario demo.toml
//!
//! # Create a config file
//! taxtrace config init
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// TaxTrace - barcode scanning for receipts and invoices
#[derive(Parser)]
#[command(name = "taxtrace")]
#[command(version)]
#[command(about = "Camera capture and barcode-scan sessions", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List capture devices
    #[command(alias = "ls")]
    Devices(commands::DevicesArgs),

    /// Run one scan session until a code is read or Ctrl+C
    Scan(commands::ScanArgs),

    /// Manage the configuration file
    Config(commands::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(format!("taxtrace={}", level).parse()?),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Devices(args) => commands::devices(args).await?,
        Commands::Scan(args) => commands::scan(args).await?,
        Commands::Config(args) => commands::config(args).await?,
    }

    Ok(())
}
