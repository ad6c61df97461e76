//! Devices command - list capture devices

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use taxtrace_core::capture::{list_devices, DeviceSelector};
use taxtrace_core::sim::VirtualMedia;

use super::{load_config, load_scenario};

/// Arguments for the devices command
#[derive(Args)]
pub struct DevicesArgs {
    /// Scenario file describing the virtual backend (built-in demo if omitted)
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct DeviceRow<'a> {
    id: &'a str,
    label: &'a str,
    rear: bool,
    selected: bool,
}

/// List capture devices and mark the one a scan would use
pub async fn devices(args: DevicesArgs) -> Result<()> {
    let scenario = load_scenario(args.scenario.as_deref())?;
    let config = load_config(args.config.as_deref())?;

    let media = VirtualMedia::new(scenario);
    let devices = list_devices(&media).await?;

    let selector = DeviceSelector::new(&config.rear_keywords);
    let selected_id = selector.select(&devices).map(|d| d.id.clone());

    let rows: Vec<DeviceRow> = devices
        .iter()
        .map(|d| DeviceRow {
            id: &d.id,
            label: &d.label,
            rear: selector.is_rear_facing(d),
            selected: selected_id.as_deref() == Some(d.id.as_str()),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("TaxTrace - Capture Devices\n");

    if rows.is_empty() {
        println!("No video input devices found.");
        return Ok(());
    }

    println!("{:<3} {:<20} {:<32} {:<6}", "", "ID", "Label", "Rear");
    println!("{}", "-".repeat(63));

    for row in &rows {
        println!(
            "{:<3} {:<20} {:<32} {:<6}",
            if row.selected { "*" } else { "" },
            truncate(row.id, 18),
            truncate(row.label, 30),
            if row.rear { "yes" } else { "no" }
        );
    }

    println!("\n* device a scan session would open");

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
