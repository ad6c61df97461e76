//! Integration tests for the scan lifecycle
//!
//! Sessions run against the virtual backend; counters on the backend
//! prove that every acquired track is released.

mod mocks;

use mocks::{
    eventually, phone_scenario, virtual_scanner, BrokenEngine, SlowBindEngine, StubbornEngine,
    SuccessLog,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taxtrace_core::media::{AdvancedConstraint, FocusMode};
use taxtrace_core::sim::{AcquireStep, FrameStep, Scenario, VirtualBackend};
use taxtrace_core::types::FrameOutcome;
use taxtrace_core::{ScanError, ScanOutcome, Scanner, ScannerConfig, SessionStatus};
use tokio::time::timeout;

const DEADLINE: Duration = Duration::from_secs(5);

fn scan_frames() -> Vec<FrameStep> {
    vec![
        FrameStep::Miss,
        FrameStep::Transient,
        FrameStep::code("CODE123"),
        FrameStep::code("CODE123"),
    ]
}

#[tokio::test]
async fn test_scan_reports_once_and_releases() {
    let (scanner, stats) = virtual_scanner(phone_scenario().with_frames(scan_frames()));
    let log = SuccessLog::new();

    let mut scan = scanner.activate(log.callback());
    let outcome = timeout(DEADLINE, scan.wait()).await.unwrap().unwrap();
    timeout(DEADLINE, scan.join_startup()).await.unwrap();

    assert_eq!(outcome, ScanOutcome::Scanned("CODE123".to_string()));
    assert_eq!(log.calls(), vec!["CODE123"]);
    assert_eq!(scan.status(), SessionStatus::Stopped);
    assert!(scan.is_fired());
    assert_eq!(stats.engine_stops(), 1);
    assert_eq!(stats.live_tracks(), 0);
    assert!(!scan.session().lock().has_stream());
}

#[tokio::test]
async fn test_selects_rear_camera() {
    let (scanner, stats) = virtual_scanner(phone_scenario().with_frames(scan_frames()));

    let mut scan = scanner.activate(|_| {});
    timeout(DEADLINE, scan.wait()).await.unwrap().unwrap();

    let attempts = stats.attempts();
    assert_eq!(attempts[0].device_id.as_deref(), Some("cam1"));
    assert_eq!(
        scan.session().lock().active_device().map(|d| d.label.clone()),
        Some("Rear Camera".to_string())
    );
}

#[tokio::test]
async fn test_falls_back_to_last_device() {
    let scenario = Scenario::default()
        .with_devices(&["Camera 0", "Camera 1"])
        .with_frames(scan_frames())
        .with_frame_interval(2);
    let (scanner, stats) = virtual_scanner(scenario);

    let mut scan = scanner.activate(|_| {});
    timeout(DEADLINE, scan.wait()).await.unwrap().unwrap();

    assert_eq!(stats.attempts()[0].device_id.as_deref(), Some("cam1"));
}

#[tokio::test]
async fn test_no_devices_fails_without_acquisition() {
    let (scanner, stats) = virtual_scanner(Scenario::default());
    let log = SuccessLog::new();

    let mut scan = scanner.activate(log.callback());
    let err = timeout(DEADLINE, scan.wait()).await.unwrap().unwrap_err();

    assert!(matches!(err, ScanError::DeviceNotFound(_)));
    assert_eq!(scan.status(), SessionStatus::Failed);
    assert_eq!(stats.enumerations(), 1);
    assert_eq!(stats.acquire_attempts(), 0);
    assert!(log.calls().is_empty());
}

#[tokio::test]
async fn test_overconstrained_retries_relaxed_once() {
    let scenario = phone_scenario()
        .with_acquire(vec![AcquireStep::Overconstrained])
        .with_frames(scan_frames());
    let (scanner, stats) = virtual_scanner(scenario);

    let mut scan = scanner.activate(|_| {});
    let outcome = timeout(DEADLINE, scan.wait()).await.unwrap().unwrap();

    assert_eq!(outcome, ScanOutcome::Scanned("CODE123".to_string()));
    let attempts = stats.attempts();
    assert_eq!(attempts.len(), 2);
    assert!(attempts[0].is_strict());
    assert!(!attempts[1].is_strict());
}

#[tokio::test]
async fn test_relaxed_failure_fails_session() {
    let scenario = phone_scenario()
        .with_acquire(vec![AcquireStep::Overconstrained, AcquireStep::Overconstrained])
        .with_frames(scan_frames());
    let (scanner, stats) = virtual_scanner(scenario);

    let mut scan = scanner.activate(|_| {});
    let err = timeout(DEADLINE, scan.wait()).await.unwrap().unwrap_err();

    assert!(matches!(err, ScanError::Overconstrained { .. }));
    assert_eq!(scan.status(), SessionStatus::Failed);
    assert_eq!(stats.acquire_attempts(), 2);
    assert_eq!(stats.live_tracks(), 0);
    assert_eq!(stats.binds(), 0);
}

#[tokio::test]
async fn test_permission_denied_is_fatal() {
    let scenario = phone_scenario().with_acquire(vec![AcquireStep::PermissionDenied]);
    let (scanner, stats) = virtual_scanner(scenario);

    let mut scan = scanner.activate(|_| {});
    let err = timeout(DEADLINE, scan.wait()).await.unwrap().unwrap_err();

    assert!(matches!(err, ScanError::PermissionDenied(_)));
    assert!(err.user_hint().is_some());
    assert_eq!(stats.acquire_attempts(), 1);
}

#[tokio::test]
async fn test_deactivate_before_acquisition_resolves() {
    let scenario = phone_scenario()
        .with_acquire_delay(50)
        .with_frames(scan_frames());
    let (scanner, stats) = virtual_scanner(scenario);
    let log = SuccessLog::new();

    let mut scan = scanner.activate(log.callback());
    eventually(|| stats.acquire_attempts() == 1).await;
    assert_eq!(scan.status(), SessionStatus::Requesting);

    scan.deactivate();
    assert_eq!(scan.status(), SessionStatus::Stopped);

    timeout(DEADLINE, scan.join_startup()).await.unwrap();

    assert_eq!(scan.status(), SessionStatus::Stopped);
    assert_eq!(stats.track_stops(), 1);
    assert_eq!(stats.live_tracks(), 0);
    assert_eq!(stats.binds(), 0);
    assert!(log.calls().is_empty());
    assert_eq!(scan.wait().await.unwrap(), ScanOutcome::Cancelled);
}

#[tokio::test]
async fn test_deactivate_twice_stops_once() {
    let (scanner, stats) = virtual_scanner(phone_scenario());

    let mut scan = scanner.activate(|_| {});
    eventually(|| stats.binds() == 1).await;

    scan.deactivate();
    scan.deactivate();
    timeout(DEADLINE, scan.join_startup()).await.unwrap();
    scan.deactivate();

    assert_eq!(scan.status(), SessionStatus::Stopped);
    assert_eq!(stats.engine_stops(), 1);
    assert_eq!(stats.track_stops(), 1);
    assert_eq!(stats.live_tracks(), 0);
}

#[tokio::test]
async fn test_tuning_applied_once() {
    let (scanner, stats) = virtual_scanner(phone_scenario());

    let mut scan = scanner.activate(|_| {});
    timeout(DEADLINE, scan.join_startup()).await.unwrap();

    assert_eq!(scan.status(), SessionStatus::Decoding);
    assert_eq!(
        stats.applied(),
        vec![
            AdvancedConstraint::FocusMode(FocusMode::Continuous),
            AdvancedConstraint::Zoom(2.0)
        ]
    );
    scan.deactivate();
}

#[tokio::test]
async fn test_tuning_skipped_without_capabilities() {
    let scenario = Scenario::default().with_devices(&["Rear Camera"]);
    let (scanner, stats) = virtual_scanner(scenario);

    let mut scan = scanner.activate(|_| {});
    timeout(DEADLINE, scan.join_startup()).await.unwrap();

    assert_eq!(scan.status(), SessionStatus::Decoding);
    assert!(stats.applied().is_empty());
    scan.deactivate();
}

#[tokio::test]
async fn test_rejected_tuning_does_not_fail_session() {
    let scenario = phone_scenario().rejecting("zoom").with_frames(scan_frames());
    let (scanner, stats) = virtual_scanner(scenario);

    let mut scan = scanner.activate(|_| {});
    let outcome = timeout(DEADLINE, scan.wait()).await.unwrap().unwrap();

    assert_eq!(outcome, ScanOutcome::Scanned("CODE123".to_string()));
    assert!(!stats.applied().iter().any(|c| c.name() == "zoom"));
}

#[tokio::test]
async fn test_fatal_decode_error_fails_session() {
    let scenario = phone_scenario().with_frames(vec![
        FrameStep::Miss,
        FrameStep::Fatal,
        FrameStep::code("LATE"),
    ]);
    let (scanner, stats) = virtual_scanner(scenario);
    let log = SuccessLog::new();

    let mut scan = scanner.activate(log.callback());
    let err = timeout(DEADLINE, scan.wait()).await.unwrap().unwrap_err();

    assert!(matches!(err, ScanError::Decode(_)));
    assert_eq!(scan.status(), SessionStatus::Failed);
    assert_eq!(stats.engine_stops(), 1);
    assert_eq!(stats.live_tracks(), 0);
    assert!(log.calls().is_empty());
}

#[tokio::test]
async fn test_bind_failure_releases_stream() {
    let backend = VirtualBackend::new(phone_scenario());
    let scanner = Scanner::new(
        backend.media.clone(),
        Arc::new(BrokenEngine),
        ScannerConfig::default(),
    );

    let mut scan = scanner.activate(|_| {});
    let err = timeout(DEADLINE, scan.wait()).await.unwrap().unwrap_err();

    assert!(matches!(err, ScanError::Decode(_)));
    assert_eq!(backend.stats.live_tracks(), 0);
}

#[tokio::test]
async fn test_duplicate_callbacks_are_no_ops() {
    let backend = VirtualBackend::new(phone_scenario());
    let engine = Arc::new(StubbornEngine::new(vec![
        FrameOutcome::Miss,
        FrameOutcome::transient("blurry"),
        FrameOutcome::decoded("CODE123"),
        FrameOutcome::decoded("CODE123"),
    ]));
    let scanner = Scanner::new(
        backend.media.clone(),
        engine.clone(),
        ScannerConfig::default(),
    );
    let log = SuccessLog::new();

    let mut scan = scanner.activate(log.callback());
    let outcome = timeout(DEADLINE, scan.wait()).await.unwrap().unwrap();
    timeout(DEADLINE, scan.join_startup()).await.unwrap();

    assert_eq!(outcome, ScanOutcome::Scanned("CODE123".to_string()));
    assert_eq!(engine.delivered(), 4);
    assert_eq!(log.calls(), vec!["CODE123"]);
    assert_eq!(engine.stops(), 1);
    assert_eq!(backend.stats.live_tracks(), 0);
}

#[tokio::test]
async fn test_callbacks_after_deactivate_ignored() {
    let scenario = phone_scenario()
        .with_frames(vec![FrameStep::code("TOO-LATE")])
        .with_frame_interval(40);
    let (scanner, stats) = virtual_scanner(scenario);
    let log = SuccessLog::new();

    let mut scan = scanner.activate(log.callback());
    eventually(|| stats.binds() == 1).await;
    scan.deactivate();
    timeout(DEADLINE, scan.join_startup()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(log.calls().is_empty());
    assert!(!scan.is_fired());
    assert_eq!(scan.status(), SessionStatus::Stopped);
}

#[tokio::test]
async fn test_drop_deactivates() {
    let (scanner, stats) = virtual_scanner(phone_scenario());

    let scan = scanner.activate(|_| {});
    eventually(|| stats.binds() == 1).await;
    let session = scan.session().clone();
    drop(scan);

    assert_eq!(session.lock().status(), SessionStatus::Stopped);
    assert!(!session.lock().is_active());
    eventually(|| stats.live_tracks() == 0 && stats.engine_stops() == 1).await;
}

#[tokio::test]
async fn test_status_progression_observed() {
    let scenario = phone_scenario()
        .with_acquire_delay(5)
        .with_frames(scan_frames());
    let (scanner, _stats) = virtual_scanner(scenario);

    let mut scan = scanner.activate(|_| {});
    let mut rx = scan.subscribe();
    let mut seen = vec![*rx.borrow_and_update()];
    while !seen.last().is_some_and(|s| s.is_terminal()) {
        timeout(DEADLINE, rx.changed()).await.unwrap().unwrap();
        seen.push(*rx.borrow_and_update());
    }

    assert_eq!(seen.last(), Some(&SessionStatus::Stopped));
    assert!(seen.contains(&SessionStatus::Requesting));
    scan.deactivate();
}

#[tokio::test]
async fn test_deactivate_during_tuning_sends_nothing_more() {
    let scenario = phone_scenario().with_apply_delay(50);
    let (scanner, stats) = virtual_scanner(scenario);

    let mut scan = scanner.activate(|_| {});
    eventually(|| stats.apply_requests() == 1).await;

    scan.deactivate();
    timeout(DEADLINE, scan.join_startup()).await.unwrap();

    assert_eq!(scan.status(), SessionStatus::Stopped);
    assert_eq!(stats.apply_requests(), 1);
    assert!(stats.applied().is_empty());
    assert_eq!(stats.track_stops(), 1);
    assert_eq!(stats.engine_stops(), 1);
}

#[tokio::test]
async fn test_deactivate_while_binding() {
    let backend = VirtualBackend::new(phone_scenario());
    let engine = Arc::new(SlowBindEngine::new(Duration::from_millis(50)));
    let scanner = Scanner::new(
        backend.media.clone(),
        engine.clone(),
        ScannerConfig::default(),
    );

    let mut scan = scanner.activate(|_| {});
    eventually(|| engine.started() == 1).await;
    assert_eq!(scan.status(), SessionStatus::Decoding);

    scan.deactivate();
    assert_eq!(engine.stops(), 0);
    timeout(DEADLINE, scan.join_startup()).await.unwrap();

    assert_eq!(scan.status(), SessionStatus::Stopped);
    assert_eq!(engine.stops(), 1);
    assert_eq!(backend.stats.live_tracks(), 0);
    assert_eq!(backend.stats.apply_requests(), 0);
}

#[tokio::test]
async fn test_failure_reported_on_every_wait() {
    let scenario = phone_scenario().with_frames(vec![FrameStep::Fatal]);
    let (scanner, _stats) = virtual_scanner(scenario);

    let mut scan = scanner.activate(|_| {});
    let first = timeout(DEADLINE, scan.wait()).await.unwrap();
    let second = timeout(DEADLINE, scan.wait()).await.unwrap();

    assert!(matches!(first, Err(ScanError::Decode(_))));
    assert!(matches!(second, Err(ScanError::Decode(_))));
    assert_eq!(scan.status(), SessionStatus::Failed);
}

#[tokio::test]
async fn test_stream_live_while_success_runs() {
    let (scanner, stats) = virtual_scanner(phone_scenario().with_frames(scan_frames()));
    let observed = Arc::new(Mutex::new(None));

    let seen = observed.clone();
    let counters = stats.clone();
    let mut scan = scanner.activate(move |text| {
        *seen.lock().unwrap() = Some((text, counters.live_tracks(), counters.engine_stops()));
    });
    timeout(DEADLINE, scan.wait()).await.unwrap().unwrap();

    assert_eq!(
        observed.lock().unwrap().clone(),
        Some(("CODE123".to_string(), 1, 1))
    );
    assert_eq!(stats.live_tracks(), 0);
    assert_eq!(scan.status(), SessionStatus::Stopped);
}
