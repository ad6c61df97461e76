//! Scan session record and its state machine
//!
//! A `ScanSession` is the only mutable state shared between the startup
//! sequence, the decode callbacks and deactivation. It lives behind a
//! mutex that is never held across an await or while calling out to the
//! platform, the engine or the caller.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::capture::session::{release_stream, StreamHandle};
use crate::decode::DecodeControls;
use crate::error::ScanError;
use crate::types::{CaptureDevice, Handle};

/// Session shared between the coordinator and frame callbacks
pub type SharedSession = Arc<Mutex<ScanSession>>;

/// Lifecycle status of a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// Created, startup not yet running
    Idle,
    /// Enumerating devices and acquiring a stream
    Requesting,
    /// Stream acquired, decoder not yet bound
    Streaming,
    /// Decode engine delivering frames
    Decoding,
    /// A code won the gate; teardown pending
    Scanned,
    /// Torn down
    Stopped,
    /// Torn down after a fatal error
    Failed,
}

impl SessionStatus {
    /// No further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Failed)
    }

    /// States in which the session owns a live stream
    pub fn holds_stream(&self) -> bool {
        matches!(self, Self::Streaming | Self::Decoding | Self::Scanned)
    }

    /// Whether `next` is a legal successor of this status
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (*self, next) {
            (Idle, Requesting) | (Requesting, Streaming) | (Streaming, Decoding) => true,
            (Decoding, Scanned) => true,
            (Stopped, _) | (Failed, _) => false,
            (_, Stopped) => true,
            (Scanned, Failed) => false,
            (_, Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::Streaming => "streaming",
            Self::Decoding => "decoding",
            Self::Scanned => "scanned",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Resources detached from a session, released outside the lock
#[must_use = "detached resources must be released with run()"]
#[derive(Debug, Default)]
pub struct Teardown {
    controls: Option<DecodeControls>,
    stream: Option<StreamHandle>,
}

impl Teardown {
    pub fn is_empty(&self) -> bool {
        self.controls.is_none() && self.stream.is_none()
    }

    /// Stop decoding, then release the stream
    pub fn run(self) {
        if let Some(controls) = self.controls {
            controls.stop();
        }
        release_stream(self.stream);
    }
}

/// State of one activation of the scanner
pub struct ScanSession {
    handle: Handle,
    status: SessionStatus,
    active_device: Option<CaptureDevice>,
    active_stream: Option<StreamHandle>,
    controls: Option<DecodeControls>,
    fired: bool,
    active: bool,
    scanned: Option<String>,
    failure: Option<ScanError>,
    status_tx: watch::Sender<SessionStatus>,
}

impl ScanSession {
    /// Create an idle, active session
    pub fn new(handle: Handle) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Idle);
        Self {
            handle,
            status: SessionStatus::Idle,
            active_device: None,
            active_stream: None,
            controls: None,
            fired: false,
            active: true,
            scanned: None,
            failure: None,
            status_tx,
        }
    }

    /// Wrap in the shared form used by the coordinator
    pub fn shared(handle: Handle) -> SharedSession {
        Arc::new(Mutex::new(Self::new(handle)))
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Still wanted by the caller
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// A code has already won the gate
    pub fn is_fired(&self) -> bool {
        self.fired
    }

    pub fn active_device(&self) -> Option<&CaptureDevice> {
        self.active_device.as_ref()
    }

    pub fn has_stream(&self) -> bool {
        self.active_stream.is_some()
    }

    pub fn scanned_text(&self) -> Option<&str> {
        self.scanned.as_deref()
    }

    pub fn failure(&self) -> Option<&ScanError> {
        self.failure.as_ref()
    }

    /// Move to `next` if legal; illegal transitions are logged and ignored
    pub fn transition(&mut self, next: SessionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            warn!(
                "{}: ignoring illegal transition {} -> {}",
                self.handle, self.status, next
            );
            return false;
        }
        debug!("{}: {} -> {}", self.handle, self.status, next);
        self.status = next;
        self.status_tx.send_replace(next);
        true
    }

    /// Record the device chosen for this session
    pub fn set_device(&mut self, device: CaptureDevice) {
        self.active_device = Some(device);
    }

    /// Take ownership of an acquired stream and move to Streaming
    ///
    /// Hands the stream back if the session is not in Requesting.
    pub fn attach_stream(&mut self, stream: StreamHandle) -> Result<(), StreamHandle> {
        if self.status != SessionStatus::Requesting || !self.transition(SessionStatus::Streaming) {
            return Err(stream);
        }
        self.active_stream = Some(stream);
        Ok(())
    }

    /// Keep the bound decode controls for teardown
    pub fn set_controls(&mut self, controls: DecodeControls) {
        self.controls = Some(controls);
    }

    /// Set `fired` and store the winning text; false if already fired
    pub(crate) fn mark_fired(&mut self, text: String) -> bool {
        if self.fired {
            return false;
        }
        self.fired = true;
        self.scanned = Some(text);
        true
    }

    /// Detach resources and move to `next`
    ///
    /// Decode controls always leave the session. The stream stays
    /// attached through `Scanned` and leaves with the terminal
    /// transition, so `has_stream()` tracks `holds_stream()`.
    pub fn finish(&mut self, next: SessionStatus) -> Teardown {
        if !self.transition(next) {
            return Teardown::default();
        }
        if next.is_terminal() {
            self.active = false;
        }
        Teardown {
            controls: self.controls.take(),
            stream: if next.holds_stream() {
                None
            } else {
                self.active_stream.take()
            },
        }
    }

    /// Record a fatal error and move to Failed
    ///
    /// Ignored once the session is inactive or has already fired.
    pub fn fail(&mut self, error: ScanError) -> Teardown {
        if !self.active || self.fired || self.status.is_terminal() {
            debug!("{}: ignoring late error: {}", self.handle, error);
            return Teardown::default();
        }
        warn!("{}: scan failed: {}", self.handle, error);
        self.failure = Some(error);
        self.finish(SessionStatus::Failed)
    }

    /// Caller-driven teardown; safe in any state and idempotent
    pub fn deactivate(&mut self) -> Teardown {
        if self.status.is_terminal() {
            self.active = false;
            return Teardown::default();
        }
        info!("{}: deactivating from {}", self.handle, self.status);
        self.active = false;
        self.finish(SessionStatus::Stopped)
    }
}

impl std::fmt::Debug for ScanSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("handle", &self.handle)
            .field("status", &self.status)
            .field("active_device", &self.active_device)
            .field("has_stream", &self.active_stream.is_some())
            .field("fired", &self.fired)
            .field("active", &self.active)
            .finish()
    }
}
