//! Mock infrastructure for testing
//!
//! Provides scenario builders, a success recorder and engines with
//! behaviour the virtual backend does not script.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taxtrace_core::decode::{DecodeEngine, EngineControls, FrameCallback, VideoSink};
use taxtrace_core::media::{FocusMode, TrackCapabilities, ZoomRange};
use taxtrace_core::sim::{Scenario, SimStats, VirtualBackend};
use taxtrace_core::types::{DecodeError, FrameOutcome};
use taxtrace_core::{ScannerConfig, Scanner};

/// Capabilities of a typical phone rear camera
pub fn phone_capabilities() -> TrackCapabilities {
    TrackCapabilities {
        focus_modes: vec![FocusMode::Manual, FocusMode::Continuous],
        zoom: Some(ZoomRange { min: 1.0, max: 3.0 }),
    }
}

/// Front and rear camera, quick frames
pub fn phone_scenario() -> Scenario {
    Scenario::default()
        .with_devices(&["Front Camera", "Rear Camera"])
        .with_capabilities(phone_capabilities())
        .with_frame_interval(2)
}

/// Scanner over a virtual backend, plus its counters
pub fn virtual_scanner(scenario: Scenario) -> (Scanner, Arc<SimStats>) {
    let backend = VirtualBackend::new(scenario);
    let scanner = Scanner::new(backend.media, backend.engine, ScannerConfig::default());
    (scanner, backend.stats)
}

/// Records every success callback invocation
#[derive(Clone, Default)]
pub struct SuccessLog {
    calls: Arc<Mutex<Vec<String>>>,
}

impl SuccessLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback to pass to `Scanner::activate`
    pub fn callback(&self) -> impl FnOnce(String) + Send + 'static {
        let calls = self.calls.clone();
        move |text| calls.lock().unwrap().push(text)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

/// Poll until `check` passes, panicking after a generous deadline
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}

/// Engine that delivers every frame during bind and ignores stop
///
/// Models an engine whose callbacks race with its own stop control.
pub struct StubbornEngine {
    frames: Vec<FrameOutcome>,
    stops: Arc<AtomicUsize>,
    delivered: Arc<AtomicUsize>,
}

impl StubbornEngine {
    pub fn new(frames: Vec<FrameOutcome>) -> Self {
        Self {
            frames,
            stops: Arc::new(AtomicUsize::new(0)),
            delivered: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

struct CountingControls(Arc<AtomicUsize>);

impl EngineControls for CountingControls {
    fn stop(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DecodeEngine for StubbornEngine {
    async fn decode_from_device(
        &self,
        _device_id: &str,
        _sink: VideoSink,
        mut callback: FrameCallback,
    ) -> Result<Box<dyn EngineControls>, DecodeError> {
        for frame in &self.frames {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            callback(frame.clone());
        }
        Ok(Box::new(CountingControls(self.stops.clone())))
    }
}

/// Engine whose bind resolves only after a delay, delivering nothing
pub struct SlowBindEngine {
    delay: Duration,
    started: Arc<AtomicUsize>,
    stops: Arc<AtomicUsize>,
}

impl SlowBindEngine {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            started: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Binds that have begun, resolved or not
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecodeEngine for SlowBindEngine {
    async fn decode_from_device(
        &self,
        _device_id: &str,
        _sink: VideoSink,
        _callback: FrameCallback,
    ) -> Result<Box<dyn EngineControls>, DecodeError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(Box::new(CountingControls(self.stops.clone())))
    }
}

/// Engine that refuses to bind
pub struct BrokenEngine;

#[async_trait]
impl DecodeEngine for BrokenEngine {
    async fn decode_from_device(
        &self,
        device_id: &str,
        _sink: VideoSink,
        _callback: FrameCallback,
    ) -> Result<Box<dyn EngineControls>, DecodeError> {
        Err(DecodeError::Fatal(format!("no decoder for {}", device_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_scenario_devices() {
        let scenario = phone_scenario();
        assert_eq!(scenario.devices.len(), 2);
        assert_eq!(scenario.devices[1].label, "Rear Camera");
    }

    #[test]
    fn test_success_log_records() {
        let log = SuccessLog::new();
        (log.callback())("A".to_string());
        assert_eq!(log.calls(), vec!["A"]);
    }
}
