//! Best-effort capture quality tuning
//!
//! Once a track is live, request continuous focus and a moderate digital
//! zoom if the track advertises them. Missing capabilities and rejected
//! constraints are logged and swallowed.

use tracing::{debug, info, warn};

use crate::config::ScannerConfig;
use crate::media::{AdvancedConstraint, FocusMode, MediaTrack};

/// Result of one tuning adjustment
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Adjustment {
    /// Turned off in configuration
    Disabled,
    /// Track does not advertise the capability
    Unsupported,
    /// Platform refused the constraint
    Rejected,
    /// Session ended before the request was sent
    Skipped,
    /// Constraint applied; zoom carries the level used
    Applied(Option<f64>),
}

impl Adjustment {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// What the tuner did to a track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TuneReport {
    pub focus: Adjustment,
    pub zoom: Adjustment,
}

/// Applies focus and zoom enhancements to a live track
#[derive(Debug, Clone)]
pub struct CapabilityTuner {
    continuous_focus: bool,
    zoom: Option<f64>,
}

impl CapabilityTuner {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            continuous_focus: config.continuous_focus,
            zoom: config.zoom,
        }
    }

    /// Tune the track; never fails
    ///
    /// `still_active` is checked before each request, so nothing is sent
    /// to a track whose session has ended.
    pub async fn tune(
        &self,
        track: &dyn MediaTrack,
        still_active: impl Fn() -> bool,
    ) -> TuneReport {
        let caps = track.capabilities();
        debug!("Track capabilities: {:?}", caps);

        let focus = if !self.continuous_focus {
            Adjustment::Disabled
        } else if !caps.supports_focus(FocusMode::Continuous) {
            debug!("Continuous focus not supported, skipping");
            Adjustment::Unsupported
        } else if !still_active() {
            Adjustment::Skipped
        } else {
            apply(track, AdvancedConstraint::FocusMode(FocusMode::Continuous), None).await
        };

        let zoom = match (self.zoom, caps.zoom) {
            (None, _) => Adjustment::Disabled,
            (Some(_), None) => {
                debug!("Zoom not supported, skipping");
                Adjustment::Unsupported
            }
            (Some(_), Some(_)) if !still_active() => {
                debug!("Session ended, skipping zoom");
                Adjustment::Skipped
            }
            (Some(level), Some(range)) => {
                let level = range.clamp(level);
                apply(track, AdvancedConstraint::Zoom(level), Some(level)).await
            }
        };

        TuneReport { focus, zoom }
    }
}

async fn apply(
    track: &dyn MediaTrack,
    constraint: AdvancedConstraint,
    level: Option<f64>,
) -> Adjustment {
    match track.apply_constraints(&[constraint]).await {
        Ok(()) => {
            info!("Applied {:?} to {}", constraint, track.label());
            Adjustment::Applied(level)
        }
        Err(e) => {
            warn!("Camera rejected {}: {}", constraint.name(), e);
            Adjustment::Rejected
        }
    }
}
