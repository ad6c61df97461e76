//! Scan lifecycle coordinator
//!
//! Ties a scan session to the surrounding view: `activate` when the
//! scanning view appears, `deactivate` when it goes away. Startup runs
//! as a task that re-checks the session's `active` flag after every
//! suspension point, so a late acquisition is released instead of
//! orphaned.
//!
//! ```text
//! activate ─▶ enumerate ─▶ select ─▶ acquire ─▶ bind ─▶ tune
//!                                     (strict,    │
//!                                      relaxed)   ▼
//!                               frame callbacks ─▶ gate ─▶ on_success ─▶ teardown
//! ```

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::capture::{list_devices, CaptureController, CapabilityTuner, DeviceSelector};
use crate::config::ScannerConfig;
use crate::decode::{DecodeAdapter, DecodeEngine, FrameCallback, VideoSink};
use crate::error::{Result, ScanError};
use crate::gate::ScanGate;
use crate::media::MediaDevices;
use crate::session::{ScanSession, SessionStatus, SharedSession};
use crate::types::{DecodeError, FrameOutcome, Handle};

/// Invoked once with the decoded text
pub type SuccessCallback = Box<dyn FnOnce(String) + Send + 'static>;

/// How a finished session ended, when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// A code was decoded and reported
    Scanned(String),
    /// Deactivated before any code won
    Cancelled,
}

/// Drives scan sessions against a media backend and a decode engine
pub struct Scanner {
    media: Arc<dyn MediaDevices>,
    engine: Arc<dyn DecodeEngine>,
    config: ScannerConfig,
}

impl Scanner {
    /// Create a scanner
    pub fn new(
        media: Arc<dyn MediaDevices>,
        engine: Arc<dyn DecodeEngine>,
        config: ScannerConfig,
    ) -> Self {
        for warning in config.validate() {
            warn!("{}", warning);
        }
        Self {
            media,
            engine,
            config,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Start a new scan session
    ///
    /// Returns immediately; startup continues on the tokio runtime.
    /// `on_success` runs at most once, with the first decoded text.
    /// Must be called from within a tokio runtime.
    pub fn activate<F>(&self, on_success: F) -> ActiveScan
    where
        F: FnOnce(String) + Send + 'static,
    {
        let handle = Handle::new();
        let session = ScanSession::shared(handle);
        let status_rx = session.lock().subscribe();

        info!("Activating scan {}", handle);

        let startup = Startup {
            session: session.clone(),
            media: self.media.clone(),
            engine: self.engine.clone(),
            config: self.config.clone(),
            on_success: Arc::new(Mutex::new(Some(Box::new(on_success) as SuccessCallback))),
        };
        let task = tokio::spawn(startup.run());

        ActiveScan {
            handle,
            session,
            status_rx,
            startup: Some(task),
        }
    }
}

/// A running scan session, owned by the caller
///
/// Dropping it deactivates the session.
pub struct ActiveScan {
    handle: Handle,
    session: SharedSession,
    status_rx: watch::Receiver<SessionStatus>,
    startup: Option<JoinHandle<()>>,
}

impl ActiveScan {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn status(&self) -> SessionStatus {
        self.session.lock().status()
    }

    pub fn is_fired(&self) -> bool {
        self.session.lock().is_fired()
    }

    pub fn scanned_text(&self) -> Option<String> {
        self.session.lock().scanned_text().map(str::to_string)
    }

    /// Watch status changes
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_rx.clone()
    }

    /// Shared session record, for inspection
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Tear the session down
    ///
    /// Safe in any state, including before acquisition has resolved.
    /// Repeated calls are no-ops.
    pub fn deactivate(&self) {
        let teardown = self.session.lock().deactivate();
        teardown.run();
    }

    /// Wait until the session is stopped or failed
    ///
    /// Can be called repeatedly; a failed session keeps reporting its error.
    pub async fn wait(&mut self) -> Result<ScanOutcome> {
        loop {
            if self.status_rx.borrow_and_update().is_terminal() {
                break;
            }
            if self.status_rx.changed().await.is_err() {
                break;
            }
        }

        let session = self.session.lock();
        if let Some(err) = session.failure() {
            return Err(err.clone());
        }
        Ok(match session.scanned_text() {
            Some(text) => ScanOutcome::Scanned(text.to_string()),
            None => ScanOutcome::Cancelled,
        })
    }

    /// Wait for the startup task to return
    ///
    /// Startup keeps running after deactivation until its pending
    /// platform call resolves; this lets callers observe that.
    pub async fn join_startup(&mut self) {
        if let Some(task) = self.startup.take() {
            if let Err(e) = task.await {
                warn!("{}: startup task panicked: {}", self.handle, e);
            }
        }
    }
}

impl Drop for ActiveScan {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// Everything the startup task needs, moved into it
struct Startup {
    session: SharedSession,
    media: Arc<dyn MediaDevices>,
    engine: Arc<dyn DecodeEngine>,
    config: ScannerConfig,
    on_success: Arc<Mutex<Option<SuccessCallback>>>,
}

impl Startup {
    async fn run(self) {
        let handle = self.session.lock().handle();
        match self.start().await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => debug!("{}: startup cancelled", handle),
            Err(e) => {
                let teardown = self.session.lock().fail(e);
                teardown.run();
            }
        }
    }

    /// Run `f` on the session if it is still active
    fn with_active<T>(&self, f: impl FnOnce(&mut ScanSession) -> T) -> Result<T> {
        let mut session = self.session.lock();
        if !session.is_active() {
            return Err(ScanError::Cancelled);
        }
        Ok(f(&mut session))
    }

    async fn start(&self) -> Result<()> {
        self.with_active(|s| s.transition(SessionStatus::Requesting))?;

        let devices = list_devices(self.media.as_ref()).await?;
        self.with_active(|_| ())?;

        let device = DeviceSelector::new(&self.config.rear_keywords)
            .select(&devices)
            .cloned()
            .ok_or_else(|| {
                ScanError::DeviceNotFound("no video input devices available".to_string())
            })?;
        self.with_active(|s| s.set_device(device.clone()))?;

        let controller = CaptureController::new(self.media.clone(), &self.config);
        let probe = self.session.clone();
        let stream = controller
            .acquire(&device, move || probe.lock().is_active())
            .await?;
        let track = stream.track();

        // A stream that resolves after deactivation is released here.
        let attached = {
            let mut session = self.session.lock();
            if session.is_active() {
                session.attach_stream(stream)
            } else {
                Err(stream)
            }
        };
        if let Err(stream) = attached {
            debug!("Session inactive when stream arrived, releasing it");
            stream.release();
            return Err(ScanError::Cancelled);
        }

        let callback = self.frame_callback();
        self.with_active(|s| s.transition(SessionStatus::Decoding))?;

        let adapter = DecodeAdapter::new(self.engine.clone());
        let controls = adapter
            .bind(&device, VideoSink::new(track.clone()), callback)
            .await?;

        let keep = {
            let mut session = self.session.lock();
            if session.is_active() && !session.is_fired() {
                session.set_controls(controls.clone());
                true
            } else {
                false
            }
        };
        if !keep {
            debug!("Session finished while binding, stopping decoder");
            controls.stop();
            return Ok(());
        }

        let tuner = CapabilityTuner::new(&self.config);
        let probe = self.session.clone();
        let report = tuner
            .tune(track.as_ref(), move || {
                let session = probe.lock();
                session.is_active() && !session.is_fired()
            })
            .await;
        debug!("Capture tuning: {:?}", report);

        Ok(())
    }

    fn frame_callback(&self) -> FrameCallback {
        let session = self.session.clone();
        let gate = ScanGate::new(session.clone());
        let on_success = self.on_success.clone();

        Box::new(move |outcome: FrameOutcome| match &outcome {
            FrameOutcome::Decoded(_) => {
                if !gate.attempt(&outcome) {
                    trace!("Ignoring decode result after gate closed");
                    return;
                }

                let text = session.lock().scanned_text().map(str::to_string);
                let callback = on_success.lock().take();
                if let (Some(text), Some(callback)) = (text, callback) {
                    callback(text);
                }

                let teardown = {
                    let mut s = session.lock();
                    if s.status() == SessionStatus::Scanned {
                        s.finish(SessionStatus::Stopped)
                    } else {
                        Default::default()
                    }
                };
                teardown.run();
            }
            FrameOutcome::Miss => trace!("No code in frame"),
            FrameOutcome::Error(DecodeError::Transient(msg)) => trace!("Decode miss: {}", msg),
            FrameOutcome::Error(DecodeError::Fatal(msg)) => {
                let teardown = session.lock().fail(ScanError::decode(msg.clone()));
                teardown.run();
            }
        })
    }
}
