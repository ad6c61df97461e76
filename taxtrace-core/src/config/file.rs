//! Configuration file loading and merging
//!
//! Loads user configuration from `~/.config/taxtrace/scanner.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{ScannerConfig, DEFAULT_REAR_KEYWORDS, DEFAULT_ZOOM};
use crate::error::{Result, ScanError};
use crate::types::{Facing, Resolution};

/// Configuration file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Device selection settings
    #[serde(default)]
    pub devices: DeviceSettings,

    /// Media access constraints
    #[serde(default)]
    pub constraints: ConstraintSettings,

    /// Capability tuning settings
    #[serde(default)]
    pub tuning: TuningSettings,
}

/// Device selection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Label keywords that mark a rear-facing camera
    #[serde(default = "default_keywords")]
    pub rear_keywords: Vec<String>,
}

/// Media access constraints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintSettings {
    /// Facing direction (environment, user)
    #[serde(default = "default_facing")]
    pub facing: String,

    /// Ideal width in pixels (0 = no hint)
    #[serde(default)]
    pub width: u32,

    /// Ideal height in pixels (0 = no hint)
    #[serde(default)]
    pub height: u32,
}

/// Capability tuning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningSettings {
    /// Request continuous autofocus when supported
    #[serde(default = "default_true")]
    pub continuous_focus: bool,

    /// Digital zoom level (0 = leave zoom alone)
    #[serde(default = "default_zoom")]
    pub zoom: f64,
}

// Default value functions
fn default_keywords() -> Vec<String> {
    DEFAULT_REAR_KEYWORDS.iter().map(|k| k.to_string()).collect()
}

fn default_facing() -> String {
    "environment".to_string()
}

fn default_true() -> bool {
    true
}

fn default_zoom() -> f64 {
    DEFAULT_ZOOM
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            rear_keywords: default_keywords(),
        }
    }
}

impl Default for ConstraintSettings {
    fn default() -> Self {
        Self {
            facing: default_facing(),
            width: 0,
            height: 0,
        }
    }
}

impl Default for TuningSettings {
    fn default() -> Self {
        Self {
            continuous_focus: true,
            zoom: default_zoom(),
        }
    }
}

impl ConfigFile {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("taxtrace").join("scanner.toml")
        } else if let Ok(home) = std::env::var("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("taxtrace")
                .join("scanner.toml")
        } else {
            PathBuf::from("/etc/taxtrace/scanner.toml")
        }
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ScanError::Config(format!("Failed to read config file: {}", e)))?;

        let config: ConfigFile = toml::from_str(&content)
            .map_err(|e| ScanError::Config(format!("Failed to parse config file: {}", e)))?;

        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load configuration, logging warnings but returning defaults on error
    pub fn load_or_default() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load config file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ScanError::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = self.to_toml()?;

        std::fs::write(path, content)
            .map_err(|e| ScanError::Config(format!("Failed to write config file: {}", e)))?;

        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Serialize as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Convert into the runtime configuration
    pub fn into_scanner_config(self) -> Result<ScannerConfig> {
        let facing: Facing = self
            .constraints
            .facing
            .parse()
            .map_err(ScanError::Config)?;

        let resolution = match (self.constraints.width, self.constraints.height) {
            (0, 0) => None,
            (w, h) if w == 0 || h == 0 => {
                return Err(ScanError::config(format!(
                    "Resolution hint needs both width and height, got {}x{}",
                    w, h
                )));
            }
            (w, h) => Some(Resolution::new(w, h)),
        };

        let zoom = if self.tuning.zoom == 0.0 {
            None
        } else {
            Some(self.tuning.zoom)
        };

        let config = ScannerConfig {
            rear_keywords: self.devices.rear_keywords,
            facing,
            resolution,
            continuous_focus: self.tuning.continuous_focus,
            zoom,
        };
        config.validate_strict()?;

        for warning in config.validate() {
            warn!("{}", warning);
        }

        Ok(config)
    }
}

/// Generate a sample configuration file
pub fn sample_config() -> String {
    r#"# TaxTrace scanner configuration

[devices]
# Camera labels containing any of these words (case-insensitive) are
# treated as rear-facing. The first match wins; with no match the last
# listed camera is used.
rear_keywords = ["back", "rear", "environment"]

[constraints]
# Facing direction: environment (rear) or user (front).
# Requested exactly first, then as a preference if the camera refuses.
facing = "environment"

# Ideal resolution hint in pixels (0 = let the platform choose)
width = 0
height = 0

[tuning]
# Request continuous autofocus when the camera supports it
continuous_focus = true

# Digital zoom level when supported (0 = leave zoom alone)
zoom = 2.0
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();
        assert_eq!(config.devices.rear_keywords.len(), 3);
        assert_eq!(config.constraints.facing, "environment");
        assert!(config.tuning.continuous_focus);
    }

    #[test]
    fn test_default_path_file_name() {
        let path = ConfigFile::default_path();
        assert!(path.ends_with("taxtrace/scanner.toml"));
    }
}
