//! Scan command - run one scan session

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use taxtrace_core::sim::VirtualBackend;
use taxtrace_core::{ScanOutcome, Scanner};
use tokio::signal;
use tracing::{info, warn};

use super::{load_config, load_scenario};

/// Arguments for the scan command
#[derive(Args)]
pub struct ScanArgs {
    /// Scenario file describing the virtual backend (built-in demo if omitted)
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Run a scan session until a code is decoded, it fails, or Ctrl+C
pub async fn scan(args: ScanArgs) -> Result<()> {
    println!("TaxTrace - Scanning\n");

    let config = load_config(args.config.as_deref())?;
    let scenario = load_scenario(args.scenario.as_deref())?;

    println!("Configuration:");
    println!("  Rear keywords: {}", config.rear_keywords.join(", "));
    println!("  Facing:        {:?}", config.facing);
    match config.resolution {
        Some(res) => println!("  Resolution:    {}", res),
        None => println!("  Resolution:    platform default"),
    }
    match config.zoom {
        Some(zoom) => println!("  Zoom:          {:.1}x", zoom),
        None => println!("  Zoom:          off"),
    }
    println!();

    let backend = VirtualBackend::new(scenario);
    let stats = backend.stats.clone();
    let scanner = Scanner::new(backend.media, backend.engine, config);

    let mut session = scanner.activate(|text| {
        println!("Scanned: {}", text);
    });
    info!("Started {}", session.handle());

    println!("Point the camera at a barcode. Press Ctrl+C to stop...\n");

    let result = tokio::select! {
        signal = signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!("Failed to listen for Ctrl+C: {}", e);
            }
            println!("\nReceived interrupt signal...");
            Ok(ScanOutcome::Cancelled)
        }
        result = session.wait() => result,
    };

    session.deactivate();
    session.join_startup().await;

    info!(
        "Session finished: {} request(s), {} frame(s), {} live track(s)",
        stats.acquire_attempts(),
        stats.frames_delivered(),
        stats.live_tracks()
    );

    match result {
        Ok(ScanOutcome::Scanned(_)) => println!("Scan complete."),
        Ok(ScanOutcome::Cancelled) => println!("Scan cancelled."),
        Err(e) => {
            if let Some(hint) = e.user_hint() {
                eprintln!("Hint: {}", hint);
            }
            return Err(e).context("Scan failed");
        }
    }

    Ok(())
}
