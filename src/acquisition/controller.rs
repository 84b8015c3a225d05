// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Acquisition controller
//!
//! [`AcquisitionController`] is the worker half: it is moved into the
//! acquisition thread and runs one [`AcquisitionController::cycle`] after
//! another. [`ControlHandle`] is the control half: it is cloned freely and
//! used from any thread to select cameras, change settings and drive the
//! state machine.
//!
//! ```text
//!   Idle ──select──▶ Paused ◀──pause/resume──▶ Running
//!                      │                          │
//!                      └───────request_stop───────┴──▶ Stopping ──▶ Stopped
//! ```
//!
//! Settings changes run under the control lock and end by publishing a new
//! snapshot. The worker never waits on a control operation beyond that lock.
//! Operations that talk to a camera do it outside the control lock and are
//! serialized among themselves by a separate device lock: a camera busy with
//! a frame read delays only the operation addressing it, while `state`,
//! `pause` and the other lock-only operations return immediately.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use thiserror::Error;

use super::accumulator::FrameAccumulator;
use super::snapshot::{AcquisitionSnapshot, ProcessingSettings, SnapshotCell};
use super::stream::{ImageFrame, ProcessedTrace, ResultSink};
use crate::axis::PresentationAxes;
use crate::camera::{
    discover, CameraError, CameraPort, CameraRegistry, DiscoveryReport, Frame, ProbeCandidate,
    Roi, SpectralPeak, TemperatureReading,
};
use crate::config::{AxisConfig, Config, FailureAction};
use crate::preprocessing::{Filter, HighpassFilter};
use crate::spectral::SpectralTransformer;

/// Errors returned by control operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("Unknown camera '{0}'")]
    UnknownCamera(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("No camera selected")]
    NoCameraSelected,

    #[error("Acquisition has been stopped")]
    Stopped,

    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// Frame read failure, tagged with the camera the frame was read from
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Frame read from '{camera_id}' failed: {error}")]
pub struct FrameError {
    pub camera_id: String,
    pub error: CameraError,
}

/// A camera failure that forced a state change
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub camera_id: String,
    pub error: CameraError,
    pub consecutive_failures: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// Shutdown was requested
    Requested,
    /// The camera kept failing and the failure policy stopped the worker
    DeviceFailure(Fault),
}

/// Lifecycle of the acquisition worker
#[derive(Debug, Clone, PartialEq)]
pub enum AcquisitionState {
    /// No camera selected yet
    Idle,
    Paused,
    Running,
    /// Stop requested, the worker exits at its next state check
    Stopping,
    Stopped(StopReason),
}

impl AcquisitionState {
    fn is_terminal(&self) -> bool {
        matches!(self, AcquisitionState::Stopping | AcquisitionState::Stopped(_))
    }
}

/// Outcome of one worker cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    /// A trace was published with this sequence number
    Processed(u64),
    /// The frame belonged to a camera or buffer that was replaced during the read
    Discarded,
    /// The frame did not fit the buffer or could not be transformed
    Dropped,
    /// Not running; the worker slept up to one poll interval
    Waiting,
    /// Stop requested
    Exit,
}

struct ControlState {
    state: AcquisitionState,
    selected: Option<String>,
    accumulation_depth: usize,
    settings: ProcessingSettings,
    exposure_ms: f64,
    gain: f64,
    last_fault: Option<Fault>,
}

struct Shared {
    registry: RwLock<CameraRegistry>,
    snapshot: SnapshotCell,
    control: Mutex<ControlState>,
    wake: Condvar,
    /// Held by control operations for the duration of their camera I/O
    devices: Mutex<()>,
}

impl Shared {
    fn lock_control(&self) -> MutexGuard<'_, ControlState> {
        self.control
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_devices(&self) -> MutexGuard<'_, ()> {
        self.devices
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sleep until a control operation notifies or `timeout` elapses
    fn wait(&self, control: MutexGuard<'_, ControlState>, timeout: Duration) {
        let _ = self
            .wake
            .wait_timeout(control, timeout)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
    }

    fn camera(&self, id: &str) -> Option<Arc<dyn CameraPort>> {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
    }

    fn simulated_cameras(&self) -> Vec<(String, Arc<dyn CameraPort>)> {
        self.registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .cameras()
            .filter(|(_, camera)| camera.simulation_control().is_some())
            .map(|(id, camera)| (id.to_string(), camera.clone()))
            .collect()
    }
}

/// Thread-safe control surface of the acquisition worker
#[derive(Clone)]
pub struct ControlHandle {
    shared: Arc<Shared>,
}

/// Worker half of the acquisition engine
pub struct AcquisitionController {
    shared: Arc<Shared>,
    sink: Arc<dyn ResultSink>,
    poll_interval: Duration,
    transformer: SpectralTransformer,
    highpass: HighpassFilter,
    sequence: u64,
    adopted_generation: u64,
}

impl AcquisitionController {
    /// Create the worker and its control handle.
    ///
    /// ### Parameters
    ///
    /// * `config` - Initial accumulation depth, processing settings, exposure and gain
    /// * `registry` - Cameras available for selection
    /// * `sink` - Receives every processed trace
    pub fn new(
        config: &Config,
        registry: CameraRegistry,
        sink: Arc<dyn ResultSink>,
    ) -> (Self, ControlHandle) {
        let settings = ProcessingSettings::from_config(config);
        let shared = Arc::new(Shared {
            registry: RwLock::new(registry),
            snapshot: SnapshotCell::default(),
            control: Mutex::new(ControlState {
                state: AcquisitionState::Idle,
                selected: None,
                accumulation_depth: config.acquisition.accumulation_depth.max(1),
                settings,
                exposure_ms: config.cameras.exposure_ms,
                gain: config.cameras.gain,
                last_fault: None,
            }),
            wake: Condvar::new(),
            devices: Mutex::new(()),
        });
        let controller = Self {
            shared: shared.clone(),
            sink,
            poll_interval: config.acquisition.poll_interval(),
            transformer: SpectralTransformer::new(),
            highpass: HighpassFilter::new(config.highpass_cutoff_bin()),
            sequence: 0,
            adopted_generation: 0,
        };
        (controller, ControlHandle { shared })
    }

    /// Run one acquisition cycle.
    ///
    /// While not running, waits on the control condition variable for at most
    /// one poll interval and returns [`Cycle::Waiting`]. While running, reads
    /// one frame from the snapshot's camera, re-reads the current snapshot and
    /// discards the frame if the camera or buffer changed during the read.
    /// Otherwise the trace is filtered (when enabled), accumulated,
    /// transformed with the latest settings and published.
    ///
    /// ### Returns
    ///
    /// The cycle outcome, or the error raised by the frame read together with
    /// the id of the camera that was read. Frame read failures are left to
    /// the caller, which decides whether to retry or escalate.
    pub fn cycle(&mut self) -> Result<Cycle, FrameError> {
        let snapshot = {
            let control = self.shared.lock_control();
            let state = control.state.clone();
            match state {
                AcquisitionState::Running => {}
                AcquisitionState::Stopping | AcquisitionState::Stopped(_) => {
                    return Ok(Cycle::Exit)
                }
                AcquisitionState::Idle | AcquisitionState::Paused => {
                    self.shared.wait(control, self.poll_interval);
                    return Ok(Cycle::Waiting);
                }
            }
            let Some(snapshot) = self.shared.snapshot.load() else {
                self.shared.wait(control, self.poll_interval);
                return Ok(Cycle::Waiting);
            };
            snapshot
        };

        if snapshot.generation != self.adopted_generation {
            info!(
                "Acquiring from '{}' ({} px, depth {})",
                snapshot.camera_id,
                snapshot.camera.descriptor().pixel_count,
                snapshot.lock_buffer().depth()
            );
            self.adopted_generation = snapshot.generation;
        }

        let frame = snapshot
            .camera
            .get_frame()
            .map_err(|error| FrameError {
                camera_id: snapshot.camera_id.clone(),
                error,
            })?;

        let Some(current) = self
            .shared
            .snapshot
            .load()
            .filter(|current| current.same_source(&snapshot))
        else {
            debug!(
                "Discarding frame from '{}': source changed during the read",
                snapshot.camera_id
            );
            return Ok(Cycle::Discarded);
        };

        let settings = current.settings.clone();
        let mut trace = frame.to_trace();
        if let Some(cutoff) = settings.highpass_cutoff {
            self.highpass.set_cutoff_bin(cutoff);
            trace = match self.highpass.apply(&trace) {
                Ok(filtered) => filtered,
                Err(err) => {
                    warn!("High-pass filter failed: {}", err);
                    return Ok(Cycle::Dropped);
                }
            };
        }

        let average = {
            let mut buffer = current.lock_buffer();
            if !buffer.push(&trace) {
                return Ok(Cycle::Dropped);
            }
            buffer.average()
        };

        let spectrum = match self
            .transformer
            .magnitude_spectrum(&average, &settings.spectral)
        {
            Ok(spectrum) => spectrum,
            Err(err) => {
                warn!("Spectral transform failed: {}", err);
                return Ok(Cycle::Dropped);
            }
        };

        self.sequence += 1;
        let timestamp = Utc::now();
        if let Frame::Area(image) = frame {
            self.sink.consume_image(&ImageFrame {
                sequence: self.sequence,
                camera_id: current.camera_id.clone(),
                timestamp,
                image,
            });
        }
        self.sink.consume(&ProcessedTrace {
            sequence: self.sequence,
            camera_id: current.camera_id.clone(),
            timestamp,
            raw: average,
            spectrum,
            axes: current.axes.clone(),
        });

        if self.sequence % 100 == 0 {
            debug!("{} traces published", self.sequence);
        }
        Ok(Cycle::Processed(self.sequence))
    }

    /// Mark the worker as stopped. A device-failure stop keeps its reason.
    pub fn finish(&self) {
        let mut control = self.shared.lock_control();
        if !matches!(control.state, AcquisitionState::Stopped(_)) {
            control.state = AcquisitionState::Stopped(StopReason::Requested);
        }
        self.shared.wake.notify_all();
    }

    /// Number of traces published so far
    pub fn published(&self) -> u64 {
        self.sequence
    }
}

impl ControlHandle {
    fn lock(&self) -> Result<MutexGuard<'_, ControlState>, ControlError> {
        let control = self.shared.lock_control();
        if control.state.is_terminal() {
            return Err(ControlError::Stopped);
        }
        Ok(control)
    }

    /// Build and publish a snapshot for `camera_id` with the current settings
    fn publish(
        &self,
        control: &ControlState,
        camera_id: &str,
        camera: Arc<dyn CameraPort>,
        buffer: Option<Arc<Mutex<FrameAccumulator>>>,
    ) -> Result<Arc<AcquisitionSnapshot>, ControlError> {
        let descriptor = camera.descriptor();
        let width = descriptor.pixel_count;
        let window = control
            .settings
            .spectral
            .window(width)
            .map_err(|e| ControlError::InvalidConfiguration(e.to_string()))?;
        let axes = PresentationAxes::build(
            width,
            descriptor.pixel_pitch_um,
            control.settings.spectral.positive_bins(width),
            window,
            &control.settings.axis.mapper(),
        );
        let buffer = buffer.unwrap_or_else(|| {
            Arc::new(Mutex::new(FrameAccumulator::new(
                control.accumulation_depth,
                width,
            )))
        });
        let snapshot = self.shared.snapshot.store(AcquisitionSnapshot {
            generation: self.shared.snapshot.next_generation(),
            camera_id: camera_id.to_string(),
            camera,
            buffer,
            settings: Arc::new(control.settings.clone()),
            axes: Arc::new(axes),
        });
        debug!(
            "Published snapshot {} for '{}'",
            snapshot.generation, snapshot.camera_id
        );
        self.shared.wake.notify_all();
        Ok(snapshot)
    }

    /// Republish the current camera, keeping or replacing its buffer
    fn republish(&self, control: &ControlState, keep_buffer: bool) -> Result<(), ControlError> {
        if let Some(current) = self.shared.snapshot.load() {
            let buffer = keep_buffer.then(|| current.buffer.clone());
            self.publish(control, &current.camera_id, current.camera.clone(), buffer)?;
        }
        Ok(())
    }

    /// Select the camera to acquire from.
    ///
    /// Applies the configured exposure and gain to the camera, allocates a
    /// fresh accumulation buffer of its width and leaves the worker Paused.
    /// A frame still being read from the previous camera is discarded.
    pub fn select_camera(&self, id: &str) -> Result<(), ControlError> {
        let _devices = self.shared.lock_devices();
        let (camera, gain, exposure_ms) = {
            let control = self.lock()?;
            let camera = self
                .shared
                .camera(id)
                .ok_or_else(|| ControlError::UnknownCamera(id.to_string()))?;
            control
                .settings
                .spectral
                .window(camera.descriptor().pixel_count)
                .map_err(|e| ControlError::InvalidConfiguration(e.to_string()))?;
            (camera, control.gain, control.exposure_ms)
        };

        let gain = camera.set_gain(gain)?;
        let exposure_ms = camera.set_exposure(exposure_ms)?;

        let mut control = self.lock()?;
        control.gain = gain;
        control.exposure_ms = exposure_ms;
        control.state = AcquisitionState::Paused;
        control.selected = Some(id.to_string());
        self.publish(&control, id, camera, None)?;
        info!("Selected camera '{}'", id);
        Ok(())
    }

    /// Change the number of averaged traces; the buffer is reallocated empty.
    pub fn set_accumulation_depth(&self, depth: usize) -> Result<(), ControlError> {
        if depth == 0 {
            return Err(ControlError::InvalidConfiguration(
                "accumulation depth must be at least 1".to_string(),
            ));
        }
        let mut control = self.lock()?;
        control.accumulation_depth = depth;
        self.republish(&control, false)
    }

    /// Change the published frequency window. The buffer is kept.
    pub fn set_frequency_window(&self, min: usize, max: Option<usize>) -> Result<(), ControlError> {
        let mut control = self.lock()?;
        let mut spectral = control.settings.spectral.clone();
        spectral.min_frequency_index = min;
        spectral.max_frequency_index = max;
        if max.is_some_and(|max| min >= max) {
            return Err(ControlError::InvalidConfiguration(format!(
                "window [{}, {:?}) is empty",
                min, max
            )));
        }
        if let Some(current) = self.shared.snapshot.load() {
            spectral
                .window(current.camera.descriptor().pixel_count)
                .map_err(|e| ControlError::InvalidConfiguration(e.to_string()))?;
        }
        control.settings.spectral = spectral;
        self.republish(&control, true)
    }

    /// Change the cutoff and center wavelengths. The buffer is kept.
    ///
    /// Simulated cameras are re-referenced to the new cutoff wavelength, so
    /// their lines stay where the new axis places them.
    pub fn set_axis_parameters(
        &self,
        cutoff_wavelength_nm: f64,
        center_wavelength_nm: f64,
    ) -> Result<(), ControlError> {
        let axis = AxisConfig {
            cutoff_wavelength_nm,
            center_wavelength_nm,
        };
        axis.validate().map_err(ControlError::InvalidConfiguration)?;
        let _devices = self.shared.lock_devices();
        drop(self.lock()?);

        for (id, camera) in self.shared.simulated_cameras() {
            if let Some(simulation) = camera.simulation_control() {
                simulation.set_reference_wavelength(cutoff_wavelength_nm)?;
                debug!("'{}' referred to {} nm", id, cutoff_wavelength_nm);
            }
        }

        let mut control = self.lock()?;
        control.settings.axis = axis;
        self.republish(&control, true)
    }

    /// Replace the synthetic lines of every simulated camera.
    ///
    /// The lines keep the current cutoff wavelength as reference and the
    /// buffer is kept. Returns the number of cameras updated.
    pub fn set_simulated_signal(
        &self,
        peaks: Vec<SpectralPeak>,
        fwhm: f64,
    ) -> Result<usize, ControlError> {
        if fwhm.is_nan() || fwhm <= 0.0 {
            return Err(ControlError::InvalidConfiguration(format!(
                "envelope width must be positive, got {}",
                fwhm
            )));
        }
        if let Some(peak) = peaks
            .iter()
            .find(|peak| peak.wavelength_nm.is_nan() || peak.wavelength_nm <= 0.0)
        {
            return Err(ControlError::InvalidConfiguration(format!(
                "line wavelength must be positive, got {} nm",
                peak.wavelength_nm
            )));
        }
        let _devices = self.shared.lock_devices();
        drop(self.lock()?);

        let cameras = self.shared.simulated_cameras();
        for (_, camera) in &cameras {
            if let Some(simulation) = camera.simulation_control() {
                simulation.set_lines(peaks.clone(), fwhm)?;
            }
        }
        info!(
            "Synthetic signal of {} line(s) applied to {} camera(s)",
            peaks.len(),
            cameras.len()
        );
        Ok(cameras.len())
    }

    /// Enable or disable the high-pass pre-filter; the buffer is reallocated.
    ///
    /// `cutoff_bin` defaults to the window's first bin.
    pub fn set_highpass(&self, enabled: bool, cutoff_bin: Option<usize>) -> Result<(), ControlError> {
        let mut control = self.lock()?;
        let cutoff = cutoff_bin.unwrap_or(control.settings.spectral.min_frequency_index);
        control.settings.highpass_cutoff = enabled.then_some(cutoff);
        self.republish(&control, false)
    }

    /// Set the exposure of the selected camera (and of later selections).
    ///
    /// Returns the exposure actually applied.
    pub fn set_exposure(&self, exposure_ms: f64) -> Result<f64, ControlError> {
        let _devices = self.shared.lock_devices();
        let camera = self.selected(&*self.lock()?);
        let applied = match camera {
            Some(camera) => camera.set_exposure(exposure_ms)?,
            None => exposure_ms,
        };
        self.lock()?.exposure_ms = applied;
        Ok(applied)
    }

    /// Set the gain of the selected camera (and of later selections).
    pub fn set_gain(&self, gain: f64) -> Result<f64, ControlError> {
        let _devices = self.shared.lock_devices();
        let camera = self.selected(&*self.lock()?);
        let applied = match camera {
            Some(camera) => camera.set_gain(gain)?,
            None => gain,
        };
        self.lock()?.gain = applied;
        Ok(applied)
    }

    /// Program the readout region of the selected camera.
    ///
    /// The buffer is reallocated since binning changes the trace scale.
    pub fn set_roi(&self, roi: Roi) -> Result<Roi, ControlError> {
        let _devices = self.shared.lock_devices();
        let camera = self.selected_or_err()?;
        let applied = camera
            .roi_control()
            .ok_or_else(|| unsupported(camera.as_ref(), "region of interest"))?
            .set_roi(roi)?;
        self.republish(&*self.lock()?, false)?;
        Ok(applied)
    }

    /// Sensor and setpoint temperature of the selected camera
    pub fn temperature(&self) -> Result<TemperatureReading, ControlError> {
        let _devices = self.shared.lock_devices();
        let camera = self.selected_or_err()?;
        let reading = camera
            .temperature_control()
            .ok_or_else(|| unsupported(camera.as_ref(), "temperature control"))?
            .temperature()?;
        Ok(reading)
    }

    pub fn set_temperature(&self, setpoint_celsius: f64) -> Result<(), ControlError> {
        let _devices = self.shared.lock_devices();
        let camera = self.selected_or_err()?;
        camera
            .temperature_control()
            .ok_or_else(|| unsupported(camera.as_ref(), "temperature control"))?
            .set_temperature(setpoint_celsius)?;
        Ok(())
    }

    /// Running → Paused. No-op when already paused or idle.
    pub fn pause(&self) -> Result<(), ControlError> {
        let mut control = self.lock()?;
        if control.state == AcquisitionState::Running {
            control.state = AcquisitionState::Paused;
            debug!("Acquisition paused");
        }
        Ok(())
    }

    /// Paused → Running. Clears the last fault; the buffer is kept.
    pub fn resume(&self) -> Result<(), ControlError> {
        let mut control = self.lock()?;
        match control.state {
            AcquisitionState::Idle => return Err(ControlError::NoCameraSelected),
            AcquisitionState::Paused => {
                control.state = AcquisitionState::Running;
                control.last_fault = None;
                debug!("Acquisition resumed");
            }
            _ => {}
        }
        self.shared.wake.notify_all();
        Ok(())
    }

    /// Ask the worker to exit. Idempotent.
    pub fn request_stop(&self) {
        let mut control = self.shared.lock_control();
        if !matches!(control.state, AcquisitionState::Stopped(_)) {
            control.state = AcquisitionState::Stopping;
        }
        self.shared.wake.notify_all();
    }

    /// Apply the repeated-failure policy.
    ///
    /// Called by the context owning the worker once a camera has failed
    /// `fault.consecutive_failures` times in a row. Has no effect after a stop
    /// request.
    pub fn escalate(&self, fault: Fault, action: FailureAction) {
        let mut control = self.shared.lock_control();
        if control.state.is_terminal() {
            return;
        }
        error!(
            "Camera '{}' failed {} times in a row ({}), applying {:?}",
            fault.camera_id, fault.consecutive_failures, fault.error, action
        );
        control.state = match action {
            FailureAction::Pause => AcquisitionState::Paused,
            FailureAction::Stop => AcquisitionState::Stopped(StopReason::DeviceFailure(fault.clone())),
        };
        control.last_fault = Some(fault);
        self.shared.wake.notify_all();
    }

    /// Probe additional cameras and register the ones found
    pub fn discover(&self, candidates: Vec<ProbeCandidate>) -> DiscoveryReport {
        let mut registry = self
            .shared
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        discover(candidates, &mut registry)
    }

    /// Close every registered camera; later calls do nothing.
    ///
    /// Must only be called once the worker thread has exited.
    pub(crate) fn close_cameras(&self) -> Vec<(String, CameraError)> {
        self.shared
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .close_all()
    }

    fn selected(&self, control: &ControlState) -> Option<Arc<dyn CameraPort>> {
        control
            .selected
            .as_deref()
            .and_then(|id| self.shared.camera(id))
    }

    /// Selected camera; the control lock is released before returning
    fn selected_or_err(&self) -> Result<Arc<dyn CameraPort>, ControlError> {
        self.selected(&*self.lock()?)
            .ok_or(ControlError::NoCameraSelected)
    }

    pub fn state(&self) -> AcquisitionState {
        self.shared.lock_control().state.clone()
    }

    pub fn last_fault(&self) -> Option<Fault> {
        self.shared.lock_control().last_fault.clone()
    }

    pub fn selected_camera(&self) -> Option<String> {
        self.shared.lock_control().selected.clone()
    }

    pub fn accumulation_depth(&self) -> usize {
        self.shared.lock_control().accumulation_depth
    }

    pub fn settings(&self) -> ProcessingSettings {
        self.shared.lock_control().settings.clone()
    }

    pub fn exposure(&self) -> f64 {
        self.shared.lock_control().exposure_ms
    }

    pub fn gain(&self) -> f64 {
        self.shared.lock_control().gain
    }

    pub fn camera_ids(&self) -> Vec<String> {
        self.shared
            .registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .ids()
    }

    pub fn camera(&self, id: &str) -> Option<Arc<dyn CameraPort>> {
        self.shared.camera(id)
    }

    /// Snapshot the worker currently acquires with
    pub fn snapshot(&self) -> Option<Arc<AcquisitionSnapshot>> {
        self.shared.snapshot.load()
    }
}

fn unsupported(camera: &dyn CameraPort, capability: &'static str) -> ControlError {
    ControlError::Camera(CameraError::UnsupportedCapability {
        camera: camera.descriptor().name.clone(),
        capability,
    })
}
