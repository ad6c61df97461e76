//! Core types for TaxTrace scanning
//!
//! These types represent the data exchanged between the scan lifecycle
//! and the platform capabilities it drives.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Global handle counter for unique session IDs
static HANDLE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque handle for a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u64);

impl Handle {
    /// Create a new unique handle
    pub fn new() -> Self {
        Self(HANDLE_COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw handle value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Session({})", self.0)
    }
}

/// A video input source exposed by the platform
///
/// The label is only used for ranking and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaptureDevice {
    /// Platform device identifier
    pub id: String,
    /// Human-readable label (may be empty before permission is granted)
    #[serde(default)]
    pub label: String,
}

impl CaptureDevice {
    /// Create a device descriptor
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

impl std::fmt::Display for CaptureDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.label.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} ({})", self.label, self.id)
        }
    }
}

/// Physical direction a camera faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Rear camera, pointing away from the user
    #[default]
    Environment,
    /// Front camera, pointing at the user
    User,
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Environment => write!(f, "environment"),
            Self::User => write!(f, "user"),
        }
    }
}

impl std::str::FromStr for Facing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "environment" | "rear" | "back" => Ok(Self::Environment),
            "user" | "front" => Ok(Self::User),
            _ => Err(format!("Unknown facing: {}", s)),
        }
    }
}

/// How strongly a facing direction is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FacingMode {
    /// The platform must honour the facing or reject the request
    Exact(Facing),
    /// The platform should prefer the facing but may ignore it
    Ideal(Facing),
}

/// Resolution hint in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    /// Create a resolution hint
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Declarative request for capture parameters, bound to one device
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstraintSet {
    /// Device the request is bound to
    pub device_id: Option<String>,
    /// Requested facing direction
    pub facing: FacingMode,
    /// Ideal resolution, never required
    pub resolution: Option<Resolution>,
}

impl ConstraintSet {
    /// Facing required exactly
    pub fn strict(device: &CaptureDevice, facing: Facing, resolution: Option<Resolution>) -> Self {
        Self {
            device_id: Some(device.id.clone()),
            facing: FacingMode::Exact(facing),
            resolution,
        }
    }

    /// Facing preferred but not required
    pub fn relaxed(device: &CaptureDevice, facing: Facing, resolution: Option<Resolution>) -> Self {
        Self {
            device_id: Some(device.id.clone()),
            facing: FacingMode::Ideal(facing),
            resolution,
        }
    }

    /// Whether the platform must honour the facing exactly
    pub fn is_strict(&self) -> bool {
        matches!(self.facing, FacingMode::Exact(_))
    }
}

/// A decoded barcode payload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecodeResult {
    /// Decoded text
    pub text: String,
}

impl DecodeResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A per-frame decode failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No code found in this frame; scanning continues
    Transient(String),
    /// The engine cannot continue
    Fatal(String),
}

impl DecodeError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transient(msg) => write!(f, "transient: {}", msg),
            Self::Fatal(msg) => write!(f, "fatal: {}", msg),
        }
    }
}

/// What the decode engine reports for one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A code was decoded
    Decoded(DecodeResult),
    /// Frame processed, nothing found and no error reported
    Miss,
    /// Frame failed to decode
    Error(DecodeError),
}

impl FrameOutcome {
    /// Shorthand for a decoded frame
    pub fn decoded(text: impl Into<String>) -> Self {
        Self::Decoded(DecodeResult::new(text))
    }

    /// Shorthand for a transient decode miss
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Error(DecodeError::Transient(msg.into()))
    }

    /// Shorthand for a fatal decode error
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Error(DecodeError::Fatal(msg.into()))
    }
}
