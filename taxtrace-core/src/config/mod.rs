//! Configuration types for TaxTrace scanning
//!
//! Provides device-selection keywords, capture constraints and tuning
//! settings for a scan session.

mod file;

pub use file::{sample_config, ConfigFile};

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};
use crate::types::{Facing, Resolution};

/// Label keywords that identify a rear-facing camera
pub const DEFAULT_REAR_KEYWORDS: [&str; 3] = ["back", "rear", "environment"];

/// Digital zoom applied when the track supports it
pub const DEFAULT_ZOOM: f64 = 2.0;

/// Runtime configuration for a scan session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Case-insensitive label keywords preferred during device selection
    pub rear_keywords: Vec<String>,
    /// Facing direction requested from the platform
    pub facing: Facing,
    /// Ideal capture resolution
    pub resolution: Option<Resolution>,
    /// Request continuous autofocus when supported
    pub continuous_focus: bool,
    /// Digital zoom level to request when supported (None = leave zoom alone)
    pub zoom: Option<f64>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            rear_keywords: DEFAULT_REAR_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            facing: Facing::Environment,
            resolution: None,
            continuous_focus: true,
            zoom: Some(DEFAULT_ZOOM),
        }
    }
}

impl ScannerConfig {
    /// Replace the rear-camera label keywords
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rear_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// Set the requested facing direction
    pub fn with_facing(mut self, facing: Facing) -> Self {
        self.facing = facing;
        self
    }

    /// Set an ideal capture resolution
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Some(Resolution::new(width, height));
        self
    }

    /// Set the zoom level to request
    pub fn with_zoom(mut self, zoom: f64) -> Self {
        self.zoom = Some(zoom);
        self
    }

    /// Never touch the track's zoom
    pub fn without_zoom(mut self) -> Self {
        self.zoom = None;
        self
    }

    /// Enable or disable continuous focus tuning
    pub fn with_continuous_focus(mut self, enabled: bool) -> Self {
        self.continuous_focus = enabled;
        self
    }

    /// Validate configuration and return warnings
    ///
    /// Warnings do not prevent a session from starting.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.rear_keywords.iter().all(|k| k.trim().is_empty()) {
            warnings.push(
                "No rear-camera keywords configured; the last listed device will always be used."
                    .to_string(),
            );
        }

        if let Some(zoom) = self.zoom {
            if zoom < 1.0 {
                warnings.push(format!(
                    "Zoom {} is below 1.0 and will widen the field of view.",
                    zoom
                ));
            } else if zoom > 5.0 {
                warnings.push(format!(
                    "Zoom {} is high; barcodes may not fit in frame.",
                    zoom
                ));
            }
        }

        if self.facing == Facing::User {
            warnings.push(
                "Front-facing capture requested; most barcodes are easier to scan with the rear camera."
                    .to_string(),
            );
        }

        warnings
    }

    /// Validate configuration, failing on values that cannot work
    pub fn validate_strict(&self) -> Result<()> {
        if let Some(zoom) = self.zoom {
            if !zoom.is_finite() || zoom <= 0.0 {
                return Err(ScanError::config(format!("Invalid zoom level: {}", zoom)));
            }
        }

        if let Some(res) = self.resolution {
            if res.width == 0 || res.height == 0 {
                return Err(ScanError::config(format!("Invalid resolution: {}", res)));
            }
        }

        Ok(())
    }
}
