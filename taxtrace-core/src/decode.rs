//! Decode engine binding
//!
//! The decode algorithm itself is opaque: an engine is bound to a device
//! and a video sink and reports one `FrameOutcome` per processed frame
//! until stopped. The adapter does not interpret outcomes; arbitration is
//! the scan gate's job.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{Result, ScanError};
use crate::media::MediaTrack;
use crate::types::{CaptureDevice, DecodeError, FrameOutcome};

/// Per-frame callback handed to the engine
pub type FrameCallback = Box<dyn FnMut(FrameOutcome) + Send + 'static>;

/// Where the engine reads frames from
#[derive(Clone)]
pub struct VideoSink {
    track: Arc<dyn MediaTrack>,
}

impl VideoSink {
    /// Sink fed by the session's live track
    pub fn new(track: Arc<dyn MediaTrack>) -> Self {
        Self { track }
    }

    pub fn track(&self) -> &Arc<dyn MediaTrack> {
        &self.track
    }
}

impl std::fmt::Debug for VideoSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoSink")
            .field("track", &self.track.label())
            .finish()
    }
}

/// Stop control returned by an engine
pub trait EngineControls: Send + Sync {
    /// Stop delivering frame callbacks
    fn stop(&self);
}

/// Continuous decode engine
#[async_trait]
pub trait DecodeEngine: Send + Sync {
    /// Start decoding frames from the device, invoking `callback` per frame
    async fn decode_from_device(
        &self,
        device_id: &str,
        sink: VideoSink,
        callback: FrameCallback,
    ) -> std::result::Result<Box<dyn EngineControls>, DecodeError>;
}

/// Idempotent stop control for a bound engine
///
/// Cloning shares the underlying control; the engine's stop runs at most
/// once across all clones.
#[derive(Clone)]
pub struct DecodeControls {
    inner: Arc<Mutex<Option<Box<dyn EngineControls>>>>,
}

impl DecodeControls {
    pub fn new(controls: Box<dyn EngineControls>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(controls))),
        }
    }

    /// Stop the engine; later calls are no-ops
    pub fn stop(&self) {
        let controls = self.inner.lock().take();
        if let Some(controls) = controls {
            controls.stop();
            info!("Decode engine stopped");
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.lock().is_none()
    }
}

impl std::fmt::Debug for DecodeControls {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeControls")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Binds a decode engine to the session's device and sink
pub struct DecodeAdapter {
    engine: Arc<dyn DecodeEngine>,
}

impl DecodeAdapter {
    pub fn new(engine: Arc<dyn DecodeEngine>) -> Self {
        Self { engine }
    }

    /// Start continuous decoding
    pub async fn bind(
        &self,
        device: &CaptureDevice,
        sink: VideoSink,
        on_frame: FrameCallback,
    ) -> Result<DecodeControls> {
        debug!("Binding decode engine to {} via {:?}", device, sink);
        let controls = self
            .engine
            .decode_from_device(&device.id, sink, on_frame)
            .await
            .map_err(|e| ScanError::decode(format!("Failed to bind decode engine: {}", e)))?;

        info!("Decode engine bound to {}", device);
        Ok(DecodeControls::new(controls))
    }
}
