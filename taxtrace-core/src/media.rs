//! Platform media capabilities consumed by the scan lifecycle
//!
//! These traits are the boundary to the host platform: device listing,
//! media access, and per-track capability introspection. Backends
//! implement them; the lifecycle never reaches past them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ScanError;
use crate::types::{CaptureDevice, ConstraintSet};

/// Failures reported by the media access capability
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MediaError {
    /// User or platform refused access
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Device missing or removed
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// A required constraint cannot be satisfied by any device
    #[error("overconstrained: {constraint}")]
    Overconstrained { constraint: String },

    /// Request aborted for any other reason
    #[error("aborted: {0}")]
    Aborted(String),
}

impl From<MediaError> for ScanError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::PermissionDenied(msg) => Self::PermissionDenied(msg),
            MediaError::DeviceNotFound(msg) => Self::DeviceNotFound(msg),
            MediaError::Overconstrained { constraint } => Self::Overconstrained { constraint },
            MediaError::Aborted(msg) => Self::Media(msg),
        }
    }
}

/// Focus modes a track may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusMode {
    None,
    Manual,
    SingleShot,
    Continuous,
}

/// Digital zoom range supported by a track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
}

impl ZoomRange {
    /// Clamp a requested level into the supported range
    pub fn clamp(&self, level: f64) -> f64 {
        level.max(self.min).min(self.max)
    }
}

/// Capability set of an active track
///
/// Any field may be absent; absence means "not supported".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackCapabilities {
    #[serde(default)]
    pub focus_modes: Vec<FocusMode>,
    #[serde(default)]
    pub zoom: Option<ZoomRange>,
}

impl TrackCapabilities {
    pub fn supports_focus(&self, mode: FocusMode) -> bool {
        self.focus_modes.contains(&mode)
    }
}

/// One entry of an advanced constraint list
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdvancedConstraint {
    FocusMode(FocusMode),
    Zoom(f64),
}

impl AdvancedConstraint {
    /// Constraint name as the platform reports it
    pub fn name(&self) -> &'static str {
        match self {
            Self::FocusMode(_) => "focusMode",
            Self::Zoom(_) => "zoom",
        }
    }
}

/// A live video track obtained from the media access capability
#[async_trait]
pub trait MediaTrack: Send + Sync {
    /// Label of the device backing this track
    fn label(&self) -> String;

    /// Capability set of the track
    fn capabilities(&self) -> TrackCapabilities;

    /// Apply an advanced constraint list
    async fn apply_constraints(&self, advanced: &[AdvancedConstraint]) -> Result<(), MediaError>;

    /// Stop the underlying hardware stream
    fn stop(&self);
}

/// Device listing and media access
#[async_trait]
pub trait MediaDevices: Send + Sync {
    /// List video input devices; may be empty
    async fn enumerate_devices(&self) -> Result<Vec<CaptureDevice>, MediaError>;

    /// Request a video track matching the constraint set
    async fn get_user_media(
        &self,
        constraints: &ConstraintSet,
    ) -> Result<Arc<dyn MediaTrack>, MediaError>;
}
