//! Single-fire arbitration of decode results
//!
//! The first decoded result seen while the session is decoding wins.
//! Everything after it, and everything after deactivation, is ignored.

use tracing::{info, trace};

use crate::session::{SessionStatus, SharedSession};
use crate::types::FrameOutcome;

/// Guards a session so exactly one decode result is reported
#[derive(Clone)]
pub struct ScanGate {
    session: SharedSession,
}

impl ScanGate {
    pub fn new(session: SharedSession) -> Self {
        Self { session }
    }

    /// Offer a frame outcome; true only for the winning call
    ///
    /// The winning call moves the session to Scanned and stops the decode
    /// engine. Check and set happen under one lock, so no other callback
    /// can observe `fired == false` afterwards.
    pub fn attempt(&self, outcome: &FrameOutcome) -> bool {
        let FrameOutcome::Decoded(result) = outcome else {
            return false;
        };

        let teardown = {
            let mut session = self.session.lock();
            if !session.is_active()
                || session.is_fired()
                || session.status() != SessionStatus::Decoding
            {
                trace!("{}: gate closed, dropping {:?}", session.handle(), result.text);
                return false;
            }
            if !session.mark_fired(result.text.clone()) {
                return false;
            }
            info!("{}: scanned {:?}", session.handle(), result.text);
            session.finish(SessionStatus::Scanned)
        };

        teardown.run();
        true
    }
}
