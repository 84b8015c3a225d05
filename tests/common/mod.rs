// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Test doubles shared by the integration tests
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, Once};
use std::thread;
use std::time::{Duration, Instant};

use rust_ftraman::acquisition::{ImageFrame, ProcessedTrace, ResultSink};
use rust_ftraman::camera::{
    Bounds, CameraDescriptor, CameraError, CameraPort, Capabilities, Frame, ProbeCandidate,
};

static INIT: Once = Once::new();

// Setup logger for tests
pub fn setup() {
    INIT.call_once(|| {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

/// Poll `condition` until it holds or `timeout` elapses
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

/// Line camera returning a constant frame, with hooks to block, fail and
/// observe reads and closes.
///
/// Like the hardware drivers it holds its device lock for the whole read, so
/// setters wait for an in-flight frame.
pub struct ScriptedCamera {
    descriptor: CameraDescriptor,
    device: Mutex<()>,
    value: Mutex<f64>,
    exposure: Mutex<f64>,
    gain: Mutex<f64>,
    gate: Mutex<Option<Receiver<()>>>,
    entered: Mutex<Option<Sender<()>>>,
    failing: AtomicBool,
    closed: AtomicBool,
    pub reads: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub closes: AtomicUsize,
    /// Reads still in progress when `close` was called
    pub in_flight_at_close: AtomicUsize,
}

impl ScriptedCamera {
    pub fn new(name: &str, pixel_count: usize, value: f64) -> Arc<Self> {
        Arc::new(Self {
            descriptor: CameraDescriptor {
                name: name.to_string(),
                pixel_count,
                pixel_pitch_um: 14.0,
                exposure_ms: Bounds::new(0.0, 1000.0),
                gain: Bounds::new(0.0, 10.0),
                capabilities: Capabilities::default(),
            },
            device: Mutex::new(()),
            value: Mutex::new(value),
            exposure: Mutex::new(10.0),
            gain: Mutex::new(1.0),
            gate: Mutex::new(None),
            entered: Mutex::new(None),
            failing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            in_flight_at_close: AtomicUsize::new(0),
        })
    }

    /// Make every read wait for a token on the returned sender. Each read
    /// announces itself on the returned receiver first. Dropping the sender
    /// releases all reads.
    pub fn gated(&self) -> (Sender<()>, Receiver<()>) {
        let (release, gate) = mpsc::channel();
        let (entered_tx, entered) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(gate);
        *self.entered.lock().unwrap() = Some(entered_tx);
        (release, entered)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_value(&self, value: f64) {
        *self.value.lock().unwrap() = value;
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Discovery probe registering this camera under `id`
    pub fn candidate(self: &Arc<Self>, id: &str) -> ProbeCandidate {
        let camera: Arc<dyn CameraPort> = self.clone();
        ProbeCandidate::new(id, move || Ok(camera))
    }
}

impl CameraPort for ScriptedCamera {
    fn descriptor(&self) -> &CameraDescriptor {
        &self.descriptor
    }

    fn get_frame(&self) -> Result<Frame, CameraError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CameraError::Closed(self.descriptor.name.clone()));
        }
        let _device = self.device.lock().unwrap();
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        if let Some(entered) = self.entered.lock().unwrap().as_ref() {
            let _ = entered.send(());
        }
        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            let _ = gate.recv();
        } else {
            thread::sleep(Duration::from_millis(1));
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CameraError::Io("scripted failure".to_string()));
        }
        let value = *self.value.lock().unwrap();
        Ok(Frame::Line(vec![value; self.descriptor.pixel_count]))
    }

    fn set_exposure(&self, exposure_ms: f64) -> Result<f64, CameraError> {
        let _device = self.device.lock().unwrap();
        let applied = self.descriptor.exposure_ms.clamp(exposure_ms);
        *self.exposure.lock().unwrap() = applied;
        Ok(applied)
    }

    fn exposure(&self) -> f64 {
        *self.exposure.lock().unwrap()
    }

    fn set_gain(&self, gain: f64) -> Result<f64, CameraError> {
        let _device = self.device.lock().unwrap();
        let applied = self.descriptor.gain.clamp(gain);
        *self.gain.lock().unwrap() = applied;
        Ok(applied)
    }

    fn gain(&self) -> f64 {
        *self.gain.lock().unwrap()
    }

    fn close(&self) -> Result<(), CameraError> {
        self.in_flight_at_close
            .fetch_add(self.in_flight.load(Ordering::SeqCst), Ordering::SeqCst);
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Sink keeping every trace and image it receives
#[derive(Default)]
pub struct CollectingSink {
    pub traces: Mutex<Vec<ProcessedTrace>>,
    pub images: Mutex<Vec<ImageFrame>>,
}

impl CollectingSink {
    pub fn count(&self) -> usize {
        self.traces.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<ProcessedTrace> {
        self.traces.lock().unwrap().last().cloned()
    }
}

impl ResultSink for CollectingSink {
    fn consume(&self, trace: &ProcessedTrace) {
        self.traces.lock().unwrap().push(trace.clone());
    }

    fn consume_image(&self, image: &ImageFrame) {
        self.images.lock().unwrap().push(image.clone());
    }
}
