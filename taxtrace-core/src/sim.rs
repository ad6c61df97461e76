//! Scripted virtual backend
//!
//! Implements the media and decode boundaries from a `Scenario`: a
//! fixed device list, an ordered script of acquisition outcomes, track
//! capabilities and an ordered script of frame outcomes. Every call is
//! counted in `SimStats` so sessions can be checked for leaks.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::decode::{DecodeEngine, EngineControls, FrameCallback, VideoSink};
use crate::error::{Result, ScanError};
use crate::media::{
    AdvancedConstraint, MediaDevices, MediaError, MediaTrack, TrackCapabilities,
};
use crate::types::{CaptureDevice, ConstraintSet, DecodeError, FrameOutcome};

/// Scripted result of one media access request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AcquireStep {
    Ok,
    Overconstrained,
    PermissionDenied,
    NotFound,
    Aborted,
}

/// Scripted frame outcome
///
/// Written as `miss`, `transient`, `fatal` or `code:<text>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FrameStep {
    Miss,
    Transient,
    Fatal,
    Code(String),
}

impl FrameStep {
    pub fn code(text: impl Into<String>) -> Self {
        Self::Code(text.into())
    }

    fn to_outcome(&self) -> FrameOutcome {
        match self {
            Self::Miss => FrameOutcome::Miss,
            Self::Transient => FrameOutcome::transient("no barcode in frame"),
            Self::Fatal => FrameOutcome::fatal("decoder crashed"),
            Self::Code(text) => FrameOutcome::decoded(text.clone()),
        }
    }
}

impl std::str::FromStr for FrameStep {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "miss" => Ok(Self::Miss),
            "transient" => Ok(Self::Transient),
            "fatal" => Ok(Self::Fatal),
            other => match other.strip_prefix("code:") {
                Some(text) if !text.is_empty() => Ok(Self::Code(text.to_string())),
                _ => Err(format!("Invalid frame step: {:?}", other)),
            },
        }
    }
}

impl TryFrom<String> for FrameStep {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FrameStep> for String {
    fn from(step: FrameStep) -> Self {
        match step {
            FrameStep::Miss => "miss".to_string(),
            FrameStep::Transient => "transient".to_string(),
            FrameStep::Fatal => "fatal".to_string(),
            FrameStep::Code(text) => format!("code:{}", text),
        }
    }
}

fn default_frame_interval() -> u64 {
    5
}

/// Script for a virtual scan session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Devices returned by enumeration, in order
    #[serde(default)]
    pub devices: Vec<CaptureDevice>,

    /// Outcomes of successive media requests; `ok` once exhausted
    #[serde(default)]
    pub acquire: Vec<AcquireStep>,

    /// Delay before each media request resolves
    #[serde(default)]
    pub acquire_delay_ms: u64,

    /// Capabilities reported by acquired tracks
    #[serde(default)]
    pub capabilities: TrackCapabilities,

    /// Constraint names tracks refuse to apply (`focusMode`, `zoom`)
    #[serde(default)]
    pub reject_constraints: Vec<String>,

    /// Delay before each constraint application resolves
    #[serde(default)]
    pub apply_delay_ms: u64,

    /// Frame outcomes delivered after binding, in order
    #[serde(default)]
    pub frames: Vec<FrameStep>,

    /// Delay between frames
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: u64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            acquire: Vec::new(),
            acquire_delay_ms: 0,
            capabilities: TrackCapabilities::default(),
            reject_constraints: Vec::new(),
            apply_delay_ms: 0,
            frames: Vec::new(),
            frame_interval_ms: default_frame_interval(),
        }
    }
}

impl Scenario {
    /// Load a scenario from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScanError::scenario(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse a scenario from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ScanError::scenario(format!("Failed to parse scenario: {}", e)))
    }

    /// Devices labelled in order, with ids `cam0`, `cam1`, ...
    pub fn with_devices(mut self, labels: &[&str]) -> Self {
        self.devices = labels
            .iter()
            .enumerate()
            .map(|(i, label)| CaptureDevice::new(format!("cam{}", i), *label))
            .collect();
        self
    }

    pub fn with_acquire(mut self, steps: Vec<AcquireStep>) -> Self {
        self.acquire = steps;
        self
    }

    pub fn with_acquire_delay(mut self, ms: u64) -> Self {
        self.acquire_delay_ms = ms;
        self
    }

    pub fn with_capabilities(mut self, capabilities: TrackCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn rejecting(mut self, constraint: impl Into<String>) -> Self {
        self.reject_constraints.push(constraint.into());
        self
    }

    pub fn with_apply_delay(mut self, ms: u64) -> Self {
        self.apply_delay_ms = ms;
        self
    }

    pub fn with_frames(mut self, frames: Vec<FrameStep>) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_frame_interval(mut self, ms: u64) -> Self {
        self.frame_interval_ms = ms;
        self
    }
}

/// Built-in demo scenario
pub fn sample_scenario() -> String {
    r#"# TaxTrace virtual scan scenario

frame_interval_ms = 40

# The strict request is refused, the relaxed one succeeds.
acquire = ["overconstrained", "ok"]

frames = ["miss", "transient", "miss", "code:8901030865278", "code:8901030865278"]

[[devices]]
id = "cam0"
label = "Front Camera"

[[devices]]
id = "cam1"
label = "Rear Camera"

[capabilities]
focus_modes = ["manual", "continuous"]
zoom = { min = 1.0, max = 4.0 }
"#
    .to_string()
}

#[derive(Debug, Default)]
struct StatsInner {
    enumerations: usize,
    attempts: Vec<ConstraintSet>,
    tracks_created: usize,
    track_stops: usize,
    apply_requests: usize,
    applied: Vec<AdvancedConstraint>,
    binds: usize,
    engine_stops: usize,
    frames_delivered: usize,
}

/// Call counters for a virtual backend
#[derive(Debug, Default)]
pub struct SimStats {
    inner: Mutex<StatsInner>,
}

impl SimStats {
    pub fn enumerations(&self) -> usize {
        self.inner.lock().enumerations
    }

    /// Constraint sets of every media request, in order
    pub fn attempts(&self) -> Vec<ConstraintSet> {
        self.inner.lock().attempts.clone()
    }

    pub fn acquire_attempts(&self) -> usize {
        self.inner.lock().attempts.len()
    }

    /// Tracks handed out and not yet stopped
    pub fn live_tracks(&self) -> usize {
        let inner = self.inner.lock();
        inner.tracks_created - inner.track_stops
    }

    pub fn track_stops(&self) -> usize {
        self.inner.lock().track_stops
    }

    /// Constraint applications requested, including refused ones
    pub fn apply_requests(&self) -> usize {
        self.inner.lock().apply_requests
    }

    /// Constraints successfully applied to any track
    pub fn applied(&self) -> Vec<AdvancedConstraint> {
        self.inner.lock().applied.clone()
    }

    pub fn binds(&self) -> usize {
        self.inner.lock().binds
    }

    pub fn engine_stops(&self) -> usize {
        self.inner.lock().engine_stops
    }

    pub fn frames_delivered(&self) -> usize {
        self.inner.lock().frames_delivered
    }
}

/// A virtual video track
pub struct VirtualTrack {
    label: String,
    capabilities: TrackCapabilities,
    rejected: Vec<String>,
    apply_delay: Duration,
    applied: Mutex<Vec<AdvancedConstraint>>,
    stopped: AtomicBool,
    stats: Arc<SimStats>,
}

impl VirtualTrack {
    /// Standalone track with its own counters
    pub fn new(label: impl Into<String>, capabilities: TrackCapabilities) -> Self {
        Self::with_stats(label, capabilities, Arc::new(SimStats::default()))
    }

    fn with_stats(
        label: impl Into<String>,
        capabilities: TrackCapabilities,
        stats: Arc<SimStats>,
    ) -> Self {
        stats.inner.lock().tracks_created += 1;
        Self {
            label: label.into(),
            capabilities,
            rejected: Vec::new(),
            apply_delay: Duration::ZERO,
            applied: Mutex::new(Vec::new()),
            stopped: AtomicBool::new(false),
            stats,
        }
    }

    /// Refuse constraints with this name
    pub fn reject(mut self, constraint: impl Into<String>) -> Self {
        self.rejected.push(constraint.into());
        self
    }

    /// Constraints applied to this track
    pub fn applied(&self) -> Vec<AdvancedConstraint> {
        self.applied.lock().clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaTrack for VirtualTrack {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn capabilities(&self) -> TrackCapabilities {
        self.capabilities.clone()
    }

    async fn apply_constraints(
        &self,
        advanced: &[AdvancedConstraint],
    ) -> std::result::Result<(), MediaError> {
        self.stats.inner.lock().apply_requests += 1;
        if !self.apply_delay.is_zero() {
            tokio::time::sleep(self.apply_delay).await;
        }
        if self.is_stopped() {
            return Err(MediaError::Aborted("track has ended".to_string()));
        }
        if let Some(rejected) = advanced
            .iter()
            .find(|c| self.rejected.iter().any(|r| r == c.name()))
        {
            return Err(MediaError::Overconstrained {
                constraint: rejected.name().to_string(),
            });
        }

        self.applied.lock().extend_from_slice(advanced);
        self.stats.inner.lock().applied.extend_from_slice(advanced);
        Ok(())
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.stats.inner.lock().track_stops += 1;
            debug!("Virtual track stopped: {}", self.label);
        }
    }
}

/// Virtual device listing and media access
pub struct VirtualMedia {
    scenario: Scenario,
    steps: Mutex<VecDeque<AcquireStep>>,
    stats: Arc<SimStats>,
}

impl VirtualMedia {
    pub fn new(scenario: Scenario) -> Self {
        Self::with_stats(scenario, Arc::new(SimStats::default()))
    }

    fn with_stats(scenario: Scenario, stats: Arc<SimStats>) -> Self {
        let steps = scenario.acquire.iter().copied().collect();
        Self {
            scenario,
            steps: Mutex::new(steps),
            stats,
        }
    }

    pub fn stats(&self) -> Arc<SimStats> {
        self.stats.clone()
    }

    fn label_for(&self, device_id: Option<&str>) -> String {
        device_id
            .and_then(|id| self.scenario.devices.iter().find(|d| d.id == id))
            .map(|d| d.label.clone())
            .unwrap_or_else(|| "Virtual Camera".to_string())
    }
}

#[async_trait]
impl MediaDevices for VirtualMedia {
    async fn enumerate_devices(&self) -> std::result::Result<Vec<CaptureDevice>, MediaError> {
        self.stats.inner.lock().enumerations += 1;
        Ok(self.scenario.devices.clone())
    }

    async fn get_user_media(
        &self,
        constraints: &ConstraintSet,
    ) -> std::result::Result<Arc<dyn MediaTrack>, MediaError> {
        self.stats.inner.lock().attempts.push(constraints.clone());

        if self.scenario.acquire_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.scenario.acquire_delay_ms)).await;
        }

        let step = self.steps.lock().pop_front().unwrap_or(AcquireStep::Ok);
        match step {
            AcquireStep::Ok => {
                let mut track = VirtualTrack::with_stats(
                    self.label_for(constraints.device_id.as_deref()),
                    self.scenario.capabilities.clone(),
                    self.stats.clone(),
                );
                track.rejected = self.scenario.reject_constraints.clone();
                track.apply_delay = Duration::from_millis(self.scenario.apply_delay_ms);
                Ok(Arc::new(track))
            }
            AcquireStep::Overconstrained => Err(MediaError::Overconstrained {
                constraint: "facingMode".to_string(),
            }),
            AcquireStep::PermissionDenied => Err(MediaError::PermissionDenied(
                "camera access blocked".to_string(),
            )),
            AcquireStep::NotFound => Err(MediaError::DeviceNotFound(
                constraints.device_id.clone().unwrap_or_default(),
            )),
            AcquireStep::Aborted => Err(MediaError::Aborted("device busy".to_string())),
        }
    }
}

/// Stop control of the virtual engine
struct VirtualControls {
    stopped: Arc<AtomicBool>,
    wake: Arc<Notify>,
    stats: Arc<SimStats>,
}

impl EngineControls for VirtualControls {
    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.stats.inner.lock().engine_stops += 1;
            self.wake.notify_one();
        }
    }
}

/// Virtual decode engine replaying scripted frame outcomes
pub struct VirtualDecodeEngine {
    scenario: Scenario,
    stats: Arc<SimStats>,
}

impl VirtualDecodeEngine {
    pub fn new(scenario: Scenario) -> Self {
        Self::with_stats(scenario, Arc::new(SimStats::default()))
    }

    fn with_stats(scenario: Scenario, stats: Arc<SimStats>) -> Self {
        Self { scenario, stats }
    }

    pub fn stats(&self) -> Arc<SimStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl DecodeEngine for VirtualDecodeEngine {
    async fn decode_from_device(
        &self,
        device_id: &str,
        sink: VideoSink,
        mut callback: FrameCallback,
    ) -> std::result::Result<Box<dyn EngineControls>, DecodeError> {
        if !self.scenario.devices.is_empty()
            && !self.scenario.devices.iter().any(|d| d.id == device_id)
        {
            return Err(DecodeError::Fatal(format!("unknown device {}", device_id)));
        }
        self.stats.inner.lock().binds += 1;

        let stopped = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let frames = self.scenario.frames.clone();
        let interval = Duration::from_millis(self.scenario.frame_interval_ms);
        let stats = self.stats.clone();

        info!(
            "Virtual decoder reading {} ({} scripted frames)",
            sink.track().label(),
            frames.len()
        );

        let task_stopped = stopped.clone();
        let task_wake = wake.clone();
        tokio::spawn(async move {
            for step in frames {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = task_wake.notified() => break,
                }
                if task_stopped.load(Ordering::SeqCst) {
                    break;
                }
                stats.inner.lock().frames_delivered += 1;
                callback(step.to_outcome());
            }
            debug!("Virtual decoder finished");
        });

        Ok(Box::new(VirtualControls {
            stopped,
            wake,
            stats: self.stats.clone(),
        }))
    }
}

/// Media backend and decode engine sharing one set of counters
pub struct VirtualBackend {
    pub media: Arc<VirtualMedia>,
    pub engine: Arc<VirtualDecodeEngine>,
    pub stats: Arc<SimStats>,
}

impl VirtualBackend {
    pub fn new(scenario: Scenario) -> Self {
        let stats = Arc::new(SimStats::default());
        Self {
            media: Arc::new(VirtualMedia::with_stats(scenario.clone(), stats.clone())),
            engine: Arc::new(VirtualDecodeEngine::with_stats(scenario, stats.clone())),
            stats,
        }
    }
}
