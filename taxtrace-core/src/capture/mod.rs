//! Camera capture: device selection, stream acquisition and tuning
//!
//! This module handles:
//! - Device enumeration and rear-camera ranking
//! - Stream acquisition with strict-then-relaxed constraints
//! - Best-effort focus and zoom tuning on the live track

pub mod devices;
pub mod session;
pub mod tuner;

pub use devices::{list_devices, DeviceSelector};
pub use session::{release_stream, CaptureController, StreamHandle};
pub use tuner::{Adjustment, CapabilityTuner, TuneReport};
