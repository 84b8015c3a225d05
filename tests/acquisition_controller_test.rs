// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

mod common;

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use approx::assert_relative_eq;
use common::{setup, CollectingSink, ScriptedCamera};
use rust_ftraman::acquisition::{
    AcquisitionController, AcquisitionState, ControlError, ControlHandle, Cycle,
};
use rust_ftraman::camera::{
    discover, CameraError, CameraPort, CameraRegistry, ProbeCandidate, Roi, SimulatedCamera,
    SimulatedSignal, SpectralPeak,
};
use rust_ftraman::config::Config;

struct Bench {
    controller: AcquisitionController,
    control: ControlHandle,
    sink: Arc<CollectingSink>,
    a: Arc<ScriptedCamera>,
    b: Arc<ScriptedCamera>,
}

fn bench(config: &Config) -> Bench {
    setup();
    let a = ScriptedCamera::new("A", 64, 2.0);
    let b = ScriptedCamera::new("B", 128, 5.0);
    let mut registry = CameraRegistry::new();
    let report = discover(vec![a.candidate("a"), b.candidate("b")], &mut registry);
    assert_eq!(report.detected().count(), 2);

    let sink = Arc::new(CollectingSink::default());
    let (controller, control) = AcquisitionController::new(config, registry, sink.clone());
    Bench {
        controller,
        control,
        sink,
        a,
        b,
    }
}

#[test]
fn test_running_cycle_publishes_trace_with_axes() {
    let mut bench = bench(&Config::default());
    bench.control.select_camera("a").unwrap();
    assert_eq!(bench.control.state(), AcquisitionState::Paused);
    bench.control.resume().unwrap();

    assert_eq!(bench.controller.cycle().unwrap(), Cycle::Processed(1));
    let trace = bench.sink.last().unwrap();
    assert_eq!(trace.camera_id, "a");
    assert_eq!(trace.raw, vec![2.0; 64]);
    // Default window: the whole positive half of the 8x padded transform
    assert_eq!(trace.spectrum.magnitudes.len(), 8 * 64 / 2);
    assert_eq!(trace.axes.wavelength_nm.len(), trace.spectrum.magnitudes.len());
    assert_eq!(trace.axes.raman_shift_cm1.len(), trace.spectrum.magnitudes.len());
    assert_eq!(trace.axes.position_mm.len(), 64);
}

#[test]
fn test_selection_applies_exposure_and_gain() {
    let mut config = Config::default();
    config.cameras.exposure_ms = 5000.0;
    config.cameras.gain = 3.0;
    let bench = bench(&config);

    bench.control.select_camera("b").unwrap();
    // Clamped to the camera bounds
    assert_eq!(bench.b.exposure(), 1000.0);
    assert_eq!(bench.control.exposure(), 1000.0);
    assert_eq!(bench.b.gain(), 3.0);

    assert_eq!(bench.control.set_gain(20.0).unwrap(), 10.0);
    assert_eq!(bench.b.gain(), 10.0);
}

#[test]
fn test_paused_worker_never_reads() {
    let mut config = Config::default();
    config.acquisition.poll_interval_ms = 1;
    let mut bench = bench(&config);

    for _ in 0..5 {
        assert_eq!(bench.controller.cycle().unwrap(), Cycle::Waiting);
    }
    bench.control.select_camera("a").unwrap();
    for _ in 0..5 {
        assert_eq!(bench.controller.cycle().unwrap(), Cycle::Waiting);
    }
    assert_eq!(bench.a.reads(), 0);
    assert_eq!(bench.sink.count(), 0);
}

#[test]
fn test_pause_and_resume_keep_the_buffer() {
    let mut config = Config::default();
    config.acquisition.accumulation_depth = 2;
    config.acquisition.poll_interval_ms = 1;
    let mut bench = bench(&config);
    bench.control.select_camera("a").unwrap();
    bench.control.resume().unwrap();

    bench.controller.cycle().unwrap();
    // One of two slots filled
    assert_relative_eq!(bench.sink.last().unwrap().raw[0], 1.0);
    let buffer = bench.control.snapshot().unwrap().buffer.clone();

    bench.control.pause().unwrap();
    assert_eq!(bench.controller.cycle().unwrap(), Cycle::Waiting);
    bench.control.resume().unwrap();
    assert!(Arc::ptr_eq(&buffer, &bench.control.snapshot().unwrap().buffer));

    bench.controller.cycle().unwrap();
    assert_relative_eq!(bench.sink.last().unwrap().raw[0], 2.0);
    assert_eq!(bench.a.reads(), 2);
}

#[test]
fn test_camera_swap_discards_in_flight_frame() {
    let bench = bench(&Config::default());
    let Bench {
        mut controller,
        control,
        sink,
        a,
        b,
    } = bench;
    let (release, entered) = a.gated();

    control.select_camera("a").unwrap();
    control.resume().unwrap();

    let worker = thread::spawn(move || {
        let outcome = controller.cycle();
        (controller, outcome)
    });
    entered.recv_timeout(Duration::from_secs(5)).unwrap();

    // The worker is blocked inside the read; selection must not wait for it
    control.select_camera("b").unwrap();
    release.send(()).unwrap();

    let (mut controller, outcome) = worker.join().unwrap();
    assert_eq!(outcome.unwrap(), Cycle::Discarded);
    assert_eq!(sink.count(), 0);

    let snapshot = control.snapshot().unwrap();
    assert_eq!(snapshot.camera_id, "b");
    assert_eq!(snapshot.lock_buffer().width(), 128);
    assert_eq!(snapshot.lock_buffer().filled(), 0);

    control.resume().unwrap();
    assert_eq!(controller.cycle().unwrap(), Cycle::Processed(1));
    assert_eq!(sink.last().unwrap().raw, vec![5.0; 128]);
    assert_eq!(b.reads(), 1);
}

#[test]
fn test_depth_change_during_read_discards_frame() {
    let bench = bench(&Config::default());
    let Bench {
        mut controller,
        control,
        sink,
        a,
        ..
    } = bench;
    let (release, entered) = a.gated();
    control.select_camera("a").unwrap();
    control.resume().unwrap();

    let worker = thread::spawn(move || controller.cycle());
    entered.recv_timeout(Duration::from_secs(5)).unwrap();
    control.set_accumulation_depth(4).unwrap();
    drop(release);

    assert_eq!(worker.join().unwrap().unwrap(), Cycle::Discarded);
    assert_eq!(sink.count(), 0);
    assert_eq!(control.snapshot().unwrap().lock_buffer().depth(), 4);
}

#[test]
fn test_window_change_keeps_buffer_and_applies_next_cycle() {
    let mut bench = bench(&Config::default());
    bench.control.select_camera("a").unwrap();
    bench.control.resume().unwrap();
    bench.controller.cycle().unwrap();
    let before = bench.control.snapshot().unwrap();

    bench.control.set_frequency_window(10, Some(50)).unwrap();
    let after = bench.control.snapshot().unwrap();
    assert!(before.same_source(&after));
    assert!(after.generation > before.generation);

    bench.controller.cycle().unwrap();
    let trace = bench.sink.last().unwrap();
    assert_eq!(trace.spectrum.window, 10..50);
    assert_eq!(trace.spectrum.magnitudes.len(), 40);
    assert_eq!(trace.axes.wavelength_nm.len(), 40);
}

#[test]
fn test_axis_change_updates_published_axes() {
    let mut bench = bench(&Config::default());
    bench.control.select_camera("a").unwrap();
    bench.control.resume().unwrap();
    bench.controller.cycle().unwrap();
    let first = bench.sink.last().unwrap();

    bench.control.set_axis_parameters(750.0, 785.0).unwrap();
    bench.controller.cycle().unwrap();
    let second = bench.sink.last().unwrap();
    // Bin 0 maps to L·λmin
    assert_relative_eq!(
        second.axes.wavelength_nm[0] / first.axes.wavelength_nm[0],
        750.0 / 500.0,
        max_relative = 1e-12
    );
}

#[test]
fn test_highpass_removes_constant_trace() {
    let mut bench = bench(&Config::default());
    bench.control.select_camera("a").unwrap();
    bench.control.set_highpass(true, Some(1)).unwrap();
    assert_eq!(bench.control.settings().highpass_cutoff, Some(1));
    bench.control.resume().unwrap();

    bench.controller.cycle().unwrap();
    let trace = bench.sink.last().unwrap();
    for value in &trace.raw {
        assert_relative_eq!(*value, 0.0, epsilon = 1e-9);
    }
}

#[test]
fn test_control_errors() {
    let bench = bench(&Config::default());
    let control = &bench.control;

    assert_eq!(control.resume(), Err(ControlError::NoCameraSelected));
    assert_eq!(
        control.select_camera("missing"),
        Err(ControlError::UnknownCamera("missing".to_string()))
    );
    assert!(matches!(
        control.set_accumulation_depth(0),
        Err(ControlError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        control.set_axis_parameters(600.0, 532.0),
        Err(ControlError::InvalidConfiguration(_))
    ));
    assert_eq!(control.set_roi(Roi::full(1)), Err(ControlError::NoCameraSelected));

    control.select_camera("a").unwrap();
    assert!(matches!(
        control.set_frequency_window(10, Some(5)),
        Err(ControlError::InvalidConfiguration(_))
    ));
    // Beyond F·N for a 64-pixel camera
    assert!(matches!(
        control.set_frequency_window(0, Some(8 * 64 + 1)),
        Err(ControlError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        control.set_roi(Roi::full(1)),
        Err(ControlError::Camera(CameraError::UnsupportedCapability { .. }))
    ));
    assert!(matches!(
        control.temperature(),
        Err(ControlError::Camera(CameraError::UnsupportedCapability { .. }))
    ));
}

#[test]
fn test_stop_is_terminal() {
    let mut bench = bench(&Config::default());
    bench.control.select_camera("a").unwrap();
    bench.control.resume().unwrap();
    bench.control.request_stop();
    assert_eq!(bench.control.state(), AcquisitionState::Stopping);

    assert_eq!(bench.controller.cycle().unwrap(), Cycle::Exit);
    assert_eq!(bench.control.select_camera("b"), Err(ControlError::Stopped));
    assert_eq!(bench.control.resume(), Err(ControlError::Stopped));

    bench.controller.finish();
    assert!(matches!(bench.control.state(), AcquisitionState::Stopped(_)));
    assert_eq!(bench.a.reads(), 0);
}

#[test]
fn test_discovery_after_launch_makes_camera_selectable() {
    let mut bench = bench(&Config::default());
    let c = ScriptedCamera::new("C", 48, 3.0);
    assert_eq!(
        bench.control.select_camera("c"),
        Err(ControlError::UnknownCamera("c".to_string()))
    );

    let report = bench
        .control
        .discover(vec![c.candidate("c"), ScriptedCamera::new("A2", 64, 1.0).candidate("a")]);
    // "a" is already registered
    assert_eq!(report.detected().collect::<Vec<_>>(), vec!["c"]);
    assert_eq!(bench.control.camera_ids(), vec!["a", "b", "c"]);

    bench.control.select_camera("c").unwrap();
    bench.control.resume().unwrap();
    assert_eq!(bench.controller.cycle().unwrap(), Cycle::Processed(1));
    assert_eq!(bench.sink.last().unwrap().raw, vec![3.0; 48]);
}

#[test]
fn test_read_failure_names_the_camera_that_was_read() {
    let Bench {
        mut controller,
        control,
        a,
        ..
    } = bench(&Config::default());
    let (release, entered) = a.gated();
    a.set_failing(true);
    control.select_camera("a").unwrap();
    control.resume().unwrap();

    let worker = thread::spawn(move || controller.cycle());
    entered.recv_timeout(Duration::from_secs(5)).unwrap();
    control.select_camera("b").unwrap();
    drop(release);

    let error = worker.join().unwrap().unwrap_err();
    assert_eq!(error.camera_id, "a");
    assert!(matches!(error.error, CameraError::Io(_)));
    assert_eq!(control.selected_camera().as_deref(), Some("b"));
}

#[test]
fn test_camera_io_does_not_block_state_queries() {
    let Bench {
        mut controller,
        control,
        a,
        ..
    } = bench(&Config::default());
    let (release, entered) = a.gated();
    control.select_camera("a").unwrap();
    control.resume().unwrap();

    let worker = thread::spawn(move || controller.cycle());
    entered.recv_timeout(Duration::from_secs(5)).unwrap();

    // Waits for the in-flight read to release the device
    let setter = {
        let control = control.clone();
        thread::spawn(move || control.set_exposure(20.0))
    };
    thread::sleep(Duration::from_millis(50));

    let (tx, rx) = mpsc::channel();
    let observer = {
        let control = control.clone();
        thread::spawn(move || {
            control.pause().unwrap();
            tx.send(control.state()).unwrap();
        })
    };
    assert_eq!(
        rx.recv_timeout(Duration::from_secs(2)).unwrap(),
        AcquisitionState::Paused
    );

    drop(release);
    assert_eq!(setter.join().unwrap().unwrap(), 20.0);
    observer.join().unwrap();
    worker.join().unwrap().unwrap();
    assert_eq!(a.exposure(), 20.0);
    assert_eq!(control.exposure(), 20.0);
}

/// Controller over a seeded simulated camera with a single line, and a
/// scripted camera that offers no synthetic signal
fn simulated_bench(
    wavelength_nm: f64,
    sink: Arc<CollectingSink>,
) -> (AcquisitionController, ControlHandle) {
    setup();
    let signal = SimulatedSignal {
        cutoff_wavelength_nm: 500.0,
        peaks: vec![SpectralPeak {
            wavelength_nm,
            amplitude: 1.0,
        }],
        fwhm: 2.0,
    };
    let sim: Arc<dyn CameraPort> =
        Arc::new(SimulatedCamera::seeded("sim", 1024, 14.0, 1, signal, 11));
    let mut registry = CameraRegistry::new();
    discover(
        vec![
            ProbeCandidate::new("sim", move || Ok(sim)),
            ScriptedCamera::new("A", 64, 1.0).candidate("a"),
        ],
        &mut registry,
    );

    let mut config = Config::default();
    config.cameras.exposure_ms = 0.0;
    config.cameras.gain = 50.0;
    config.spectral.min_frequency_index = 8;
    let (controller, control) = AcquisitionController::new(&config, registry, sink);
    control.select_camera("sim").unwrap();
    control.resume().unwrap();
    (controller, control)
}

/// Wavelength of the strongest bin of the next published trace
fn peak_wavelength(controller: &mut AcquisitionController, sink: &CollectingSink) -> f64 {
    assert!(matches!(controller.cycle().unwrap(), Cycle::Processed(_)));
    let trace = sink.last().unwrap();
    let (peak, _) = trace
        .spectrum
        .magnitudes
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
    trace.axes.wavelength_nm[peak]
}

#[test]
fn test_simulated_line_stays_in_place_after_axis_change() {
    let sink = Arc::new(CollectingSink::default());
    let (mut controller, control) = simulated_bench(600.0, sink.clone());

    let before = peak_wavelength(&mut controller, &sink);
    assert!((before - 600.0).abs() < 2.0, "peak at {} nm", before);

    control.set_axis_parameters(450.0, 532.0).unwrap();
    let simulated = control.camera("sim").unwrap();
    assert_eq!(
        simulated
            .simulation_control()
            .unwrap()
            .signal()
            .cutoff_wavelength_nm,
        450.0
    );

    let after = peak_wavelength(&mut controller, &sink);
    assert!((after - 600.0).abs() < 2.0, "peak at {} nm", after);
}

#[test]
fn test_simulated_signal_moves_the_line() {
    let sink = Arc::new(CollectingSink::default());
    let (mut controller, control) = simulated_bench(600.0, sink.clone());

    let line = SpectralPeak {
        wavelength_nm: 650.0,
        amplitude: 1.0,
    };
    // Only the simulated camera takes a synthetic signal
    assert_eq!(control.set_simulated_signal(vec![line], 2.0).unwrap(), 1);
    let signal = control
        .camera("sim")
        .unwrap()
        .simulation_control()
        .unwrap()
        .signal();
    assert_eq!(signal.peaks, vec![line]);
    assert_eq!(signal.cutoff_wavelength_nm, 500.0);

    let moved = peak_wavelength(&mut controller, &sink);
    assert!((moved - 650.0).abs() < 2.5, "peak at {} nm", moved);

    assert!(matches!(
        control.set_simulated_signal(vec![line], 0.0),
        Err(ControlError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        control.set_simulated_signal(
            vec![SpectralPeak {
                wavelength_nm: -1.0,
                amplitude: 1.0
            }],
            2.0
        ),
        Err(ControlError::InvalidConfiguration(_))
    ));
}
