//! Stream acquisition with constraint fallback
//!
//! Requests the strict constraint set first. An overconstrained
//! rejection earns exactly one retry with the relaxed set; every other
//! failure is fatal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::error::{Result, ScanError};
use crate::media::{MediaDevices, MediaError, MediaTrack};
use crate::types::{CaptureDevice, ConstraintSet, Facing, Resolution};

/// Live hardware stream owned by a scan session
///
/// Releasing stops the track once; later calls are no-ops. Dropping an
/// unreleased handle releases it.
pub struct StreamHandle {
    track: Arc<dyn MediaTrack>,
    constraints: ConstraintSet,
    released: AtomicBool,
}

impl StreamHandle {
    /// Wrap a freshly acquired track
    pub fn new(track: Arc<dyn MediaTrack>, constraints: ConstraintSet) -> Self {
        Self {
            track,
            constraints,
            released: AtomicBool::new(false),
        }
    }

    /// The live track
    pub fn track(&self) -> Arc<dyn MediaTrack> {
        self.track.clone()
    }

    /// Constraint set that was satisfied
    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    /// Whether the relaxed fallback was needed
    pub fn is_relaxed(&self) -> bool {
        !self.constraints.is_strict()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Stop the underlying hardware stream
    pub fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.track.stop();
        info!("Released capture stream: {}", self.track.label());
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle")
            .field("track", &self.track.label())
            .field("constraints", &self.constraints)
            .field("released", &self.is_released())
            .finish()
    }
}

/// Release a stream if there is one
pub fn release_stream(stream: Option<StreamHandle>) {
    if let Some(stream) = stream {
        stream.release();
    }
}

/// Acquires capture streams from the media access capability
pub struct CaptureController {
    media: Arc<dyn MediaDevices>,
    facing: Facing,
    resolution: Option<Resolution>,
}

impl CaptureController {
    /// Create a controller using the config's facing and resolution hint
    pub fn new(media: Arc<dyn MediaDevices>, config: &ScannerConfig) -> Self {
        Self {
            media,
            facing: config.facing,
            resolution: config.resolution,
        }
    }

    /// Acquire a stream for the device
    ///
    /// `still_active` is consulted before the relaxed retry; a cancelled
    /// session gets `ScanError::Cancelled` instead of a second request.
    pub async fn acquire(
        &self,
        device: &CaptureDevice,
        still_active: impl Fn() -> bool,
    ) -> Result<StreamHandle> {
        let strict = ConstraintSet::strict(device, self.facing, self.resolution);
        debug!("Requesting stream with strict constraints: {:?}", strict);

        let constraint = match self.media.get_user_media(&strict).await {
            Ok(track) => {
                info!("Acquired capture stream (strict): {}", track.label());
                return Ok(StreamHandle::new(track, strict));
            }
            Err(MediaError::Overconstrained { constraint }) => constraint,
            Err(e) => return Err(e.into()),
        };

        if !still_active() {
            debug!("Session cancelled before relaxed retry");
            return Err(ScanError::Cancelled);
        }

        warn!(
            "Exact {} camera unavailable ({} rejected), retrying with relaxed constraints",
            self.facing, constraint
        );

        let relaxed = ConstraintSet::relaxed(device, self.facing, self.resolution);
        let track = self.media.get_user_media(&relaxed).await?;
        info!("Acquired capture stream (relaxed): {}", track.label());
        Ok(StreamHandle::new(track, relaxed))
    }
}
