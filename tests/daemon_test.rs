// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{setup, wait_until, CollectingSink, ScriptedCamera};
use rust_ftraman::acquisition::{AcquisitionState, SharedSpectrumStream, StopReason};
use rust_ftraman::camera::{CameraError, ProbeCandidate};
use rust_ftraman::config::{Config, FailureAction};
use rust_ftraman::daemon::Daemon;

const PATIENCE: Duration = Duration::from_secs(10);

fn config() -> Config {
    let mut config = Config::default();
    config.acquisition.poll_interval_ms = 1;
    config.acquisition.join_timeout_ms = 50;
    config.acquisition.join_attempts = 40;
    config
}

#[test]
fn test_shutdown_closes_each_camera_once_after_worker_exit() {
    setup();
    let a = ScriptedCamera::new("A", 64, 1.0);
    let b = ScriptedCamera::new("B", 32, 1.0);
    let sink = Arc::new(CollectingSink::default());
    let mut daemon = Daemon::launch_with_candidates(
        &config(),
        vec![a.candidate("a"), b.candidate("b")],
        sink.clone(),
    )
    .unwrap();

    let control = daemon.control();
    control.select_camera("a").unwrap();
    control.resume().unwrap();
    assert!(wait_until(PATIENCE, || sink.count() >= 3));

    daemon.shutdown().unwrap();
    assert_eq!(a.closes(), 1);
    assert_eq!(b.closes(), 1);
    assert_eq!(a.in_flight_at_close.load(Ordering::SeqCst), 0);
    assert_eq!(
        daemon.state(),
        AcquisitionState::Stopped(StopReason::Requested)
    );

    daemon.shutdown().unwrap();
    drop(daemon);
    assert_eq!(a.closes(), 1);
    assert_eq!(b.closes(), 1);
}

#[test]
fn test_blocked_worker_keeps_cameras_open_until_it_exits() {
    setup();
    let a = ScriptedCamera::new("A", 64, 1.0);
    let (release, entered) = a.gated();
    let mut config = config();
    config.acquisition.join_timeout_ms = 10;
    config.acquisition.join_attempts = 3;

    let mut daemon = Daemon::launch_with_candidates(
        &config,
        vec![a.candidate("a")],
        Arc::new(CollectingSink::default()),
    )
    .unwrap();
    let control = daemon.control();
    control.select_camera("a").unwrap();
    control.resume().unwrap();
    entered.recv_timeout(PATIENCE).unwrap();

    // The worker is stuck inside the read
    assert!(daemon.shutdown().is_err());
    assert!(daemon.is_running());
    assert_eq!(a.closes(), 0);
    assert_eq!(control.state(), AcquisitionState::Stopping);

    drop(release);
    assert!(wait_until(PATIENCE, || daemon.shutdown().is_ok()));
    assert_eq!(a.closes(), 1);
    assert_eq!(a.in_flight_at_close.load(Ordering::SeqCst), 0);
    assert!(!daemon.is_running());
}

#[test]
fn test_repeated_failures_pause_acquisition() {
    setup();
    let a = ScriptedCamera::new("A", 64, 1.0);
    a.set_failing(true);
    let mut config = config();
    config.acquisition.max_consecutive_failures = 3;
    config.acquisition.on_repeated_failure = FailureAction::Pause;

    let mut daemon = Daemon::launch_with_candidates(
        &config,
        vec![a.candidate("a")],
        Arc::new(CollectingSink::default()),
    )
    .unwrap();
    let control = daemon.control();
    control.select_camera("a").unwrap();
    control.resume().unwrap();

    assert!(wait_until(PATIENCE, || control.last_fault().is_some()));
    assert_eq!(control.state(), AcquisitionState::Paused);
    let fault = control.last_fault().unwrap();
    assert_eq!(fault.camera_id, "a");
    assert_eq!(fault.consecutive_failures, 3);
    assert!(matches!(fault.error, CameraError::Io(_)));
    assert_eq!(a.reads(), 3);

    // Resuming after the device recovers clears the fault
    a.set_failing(false);
    control.resume().unwrap();
    assert!(control.last_fault().is_none());
    assert!(wait_until(PATIENCE, || a.reads() > 3));

    daemon.shutdown().unwrap();
    assert_eq!(a.closes(), 1);
}

#[test]
fn test_repeated_failures_stop_worker() {
    setup();
    let a = ScriptedCamera::new("A", 64, 1.0);
    a.set_failing(true);
    let mut config = config();
    config.acquisition.max_consecutive_failures = 2;
    config.acquisition.on_repeated_failure = FailureAction::Stop;

    let mut daemon = Daemon::launch_with_candidates(
        &config,
        vec![a.candidate("a")],
        Arc::new(CollectingSink::default()),
    )
    .unwrap();
    let control = daemon.control();
    control.select_camera("a").unwrap();
    control.resume().unwrap();

    assert!(wait_until(PATIENCE, || matches!(
        control.state(),
        AcquisitionState::Stopped(_)
    )));
    match control.state() {
        AcquisitionState::Stopped(StopReason::DeviceFailure(fault)) => {
            assert_eq!(fault.consecutive_failures, 2);
        }
        other => panic!("unexpected state {:?}", other),
    }

    daemon.shutdown().unwrap();
    assert!(matches!(
        daemon.state(),
        AcquisitionState::Stopped(StopReason::DeviceFailure(_))
    ));
    assert_eq!(a.closes(), 1);
}

#[test]
fn test_discovery_reports_missing_and_broken_probes() {
    setup();
    let a = ScriptedCamera::new("A", 64, 1.0);
    let candidates = vec![
        a.candidate("a"),
        ProbeCandidate::new("usb", || {
            Err(CameraError::NotFound("no TCD1304 on the bus".to_string()))
        }),
        ProbeCandidate::new("sdk", || Err(CameraError::Driver("init failed".to_string()))),
    ];
    let mut daemon =
        Daemon::launch_with_candidates(&config(), candidates, Arc::new(CollectingSink::default()))
            .unwrap();

    let detected: Vec<&str> = daemon.discovery().detected().collect();
    assert_eq!(detected, vec!["a"]);
    let report = daemon.discovery().to_string();
    assert!(report.contains("not found"));
    assert!(report.contains("driver error"));
    assert_eq!(daemon.control().camera_ids(), vec!["a".to_string()]);

    daemon.shutdown().unwrap();
}

#[tokio::test]
async fn test_simulated_cameras_stream_spectra() {
    setup();
    let mut config = config();
    config.cameras.exposure_ms = 1.0;
    config.cameras.simulated.truncate(1);
    let stream = SharedSpectrumStream::default();
    let mut consumer = rust_ftraman::acquisition::SpectrumStreamConsumer::new(&stream);

    let mut daemon = Daemon::launch(&config, Arc::new(stream.clone())).unwrap();
    let control = daemon.control();
    let id = control.camera_ids()[0].clone();
    control.select_camera(&id).unwrap();
    control.resume().unwrap();

    let trace = tokio::time::timeout(PATIENCE, consumer.next_trace())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(trace.camera_id, id);
    assert_eq!(
        trace.spectrum.magnitudes.len(),
        trace.axes.wavelength_nm.len()
    );

    daemon.shutdown().unwrap();
    assert!(stream.stats().total_traces >= 1);
}
