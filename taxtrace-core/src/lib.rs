//! TaxTrace Core Library
//!
//! Camera capture and barcode-scan lifecycle for TaxTrace.
//!
//! This library provides:
//! - Capture device selection with a rear-camera preference
//! - Stream acquisition with strict-then-relaxed constraint fallback
//! - Continuous decoding with exactly one reported result per session
//! - Best-effort focus and zoom tuning
//! - Guaranteed release of the camera on every exit path
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌──────────────┐    ┌───────────┐    ┌─────────────┐
//! │ Device Selector │───▶│ Capture      │───▶│ Decode    │───▶│ Scan Gate   │
//! │ (labels)        │    │ (constraints)│    │ Adapter   │    │ (one shot)  │
//! └─────────────────┘    └──────────────┘    └───────────┘    └─────────────┘
//! ```
//!
//! The platform is reached only through [`media::MediaDevices`],
//! [`media::MediaTrack`] and [`decode::DecodeEngine`]. The [`sim`] module
//! provides a scripted implementation of all three.

pub mod capture;
pub mod config;
pub mod decode;
pub mod error;
pub mod gate;
pub mod media;
pub mod scanner;
pub mod session;
pub mod sim;
pub mod types;

pub use config::{ConfigFile, ScannerConfig};
pub use error::{Result, ScanError};
pub use scanner::{ActiveScan, ScanOutcome, Scanner};
pub use session::SessionStatus;
pub use types::{CaptureDevice, DecodeResult, FrameOutcome, Handle};
