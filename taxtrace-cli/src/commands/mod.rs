//! CLI command implementations

mod config;
mod devices;
mod scan;

use anyhow::{Context, Result};
use std::path::Path;
use taxtrace_core::sim::{sample_scenario, Scenario};
use taxtrace_core::{ConfigFile, ScannerConfig};

pub use config::{config, ConfigArgs};
pub use devices::{devices, DevicesArgs};
pub use scan::{scan, ScanArgs};

/// Load a scenario file, or the built-in demo when none is given
fn load_scenario(path: Option<&Path>) -> Result<Scenario> {
    match path {
        Some(path) => Scenario::load(path)
            .with_context(|| format!("Failed to load scenario {}", path.display())),
        None => Scenario::parse(&sample_scenario()).context("Built-in scenario is invalid"),
    }
}

/// Load the scanner config from `path`, or from the default location
fn load_config(path: Option<&Path>) -> Result<ScannerConfig> {
    let file = match path {
        Some(path) => ConfigFile::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ConfigFile::load_or_default(),
    };
    file.into_scanner_config().context("Invalid scanner configuration")
}
