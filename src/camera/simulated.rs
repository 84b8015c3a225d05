// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated camera
//!
//! Generates synthetic interferograms: a sum of cosine fringes, one per
//! spectral line, under a Gaussian envelope, with uniform noise and a random
//! sub-pixel phase on every frame. The fringe frequency of a line at `λ` is
//! `λmin/(2λ)` cycles per pixel, so the spectrum of a simulated frame peaks
//! exactly where the wavelength axis places `λ`.

use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{
    bin_rows, Bounds, CameraDescriptor, CameraError, CameraPort, Capabilities, Frame, Roi,
    RoiControl, SimulationControl, TemperatureControl, TemperatureReading,
};

const AMBIENT_CELSIUS: f64 = 20.0;
const COOLING_TIME_CONSTANT: Duration = Duration::from_secs(5);

/// One emission line of the synthetic spectrum
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralPeak {
    pub wavelength_nm: f64,
    pub amplitude: f64,
}

/// Parameters of the synthetic interferogram
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedSignal {
    /// Cutoff wavelength the fringe frequencies are referred to, in nm
    pub cutoff_wavelength_nm: f64,
    pub peaks: Vec<SpectralPeak>,
    /// Width of the Gaussian envelope as a fraction of the sensor length
    pub fwhm: f64,
}

impl Default for SimulatedSignal {
    fn default() -> Self {
        Self {
            cutoff_wavelength_nm: 500.0,
            peaks: vec![
                SpectralPeak {
                    wavelength_nm: 531.0,
                    amplitude: 0.2,
                },
                SpectralPeak {
                    wavelength_nm: 532.0,
                    amplitude: 0.4,
                },
                SpectralPeak {
                    wavelength_nm: 533.0,
                    amplitude: 0.4,
                },
            ],
            fwhm: 0.5,
        }
    }
}

struct SimulatedState {
    exposure_ms: f64,
    gain: f64,
    signal: SimulatedSignal,
    rng: StdRng,
    roi: Roi,
    setpoint_celsius: f64,
    setpoint_changed: Instant,
    closed: bool,
}

/// Camera producing synthetic interferograms.
///
/// With `rows == 1` it behaves as a line sensor. With more rows it emulates an
/// area sensor (identical fringes on every row, independent noise) and offers
/// the ROI and temperature capabilities.
pub struct SimulatedCamera {
    descriptor: CameraDescriptor,
    rows: usize,
    state: Mutex<SimulatedState>,
}

impl SimulatedCamera {
    /// Create a simulated camera.
    ///
    /// ### Parameters
    ///
    /// * `name` - Model name reported in the descriptor
    /// * `pixel_count` - Pixels per line
    /// * `pixel_pitch_um` - Pixel pitch in µm
    /// * `rows` - Sensor rows (1 for a line sensor)
    /// * `signal` - Synthetic spectrum
    pub fn new(
        name: &str,
        pixel_count: usize,
        pixel_pitch_um: f64,
        rows: usize,
        signal: SimulatedSignal,
    ) -> Self {
        Self::with_rng(
            name,
            pixel_count,
            pixel_pitch_um,
            rows,
            signal,
            StdRng::from_os_rng(),
        )
    }

    /// Same as [`SimulatedCamera::new`] with a reproducible noise sequence
    pub fn seeded(
        name: &str,
        pixel_count: usize,
        pixel_pitch_um: f64,
        rows: usize,
        signal: SimulatedSignal,
        seed: u64,
    ) -> Self {
        Self::with_rng(
            name,
            pixel_count,
            pixel_pitch_um,
            rows,
            signal,
            StdRng::seed_from_u64(seed),
        )
    }

    fn with_rng(
        name: &str,
        pixel_count: usize,
        pixel_pitch_um: f64,
        rows: usize,
        signal: SimulatedSignal,
        rng: StdRng,
    ) -> Self {
        let rows = rows.max(1);
        let area = rows > 1;
        Self {
            descriptor: CameraDescriptor {
                name: name.to_string(),
                pixel_count,
                pixel_pitch_um,
                exposure_ms: Bounds::new(0.0, 10_000.0),
                gain: Bounds::new(0.0, 1_000.0),
                capabilities: Capabilities {
                    roi: area,
                    temperature_control: area,
                    simulated: true,
                },
            },
            rows,
            state: Mutex::new(SimulatedState {
                exposure_ms: 10.0,
                gain: 1.0,
                signal,
                rng,
                roi: Roi::full(rows),
                setpoint_celsius: AMBIENT_CELSIUS,
                setpoint_changed: Instant::now(),
                closed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn open_state(&self) -> Result<MutexGuard<'_, SimulatedState>, CameraError> {
        let state = self.lock();
        if state.closed {
            return Err(CameraError::Closed(self.descriptor.name.clone()));
        }
        Ok(state)
    }

    /// Noise-free fringe pattern for a phase offset `phase` in pixels
    fn fringes(&self, signal: &SimulatedSignal, phase: f64) -> Vec<f64> {
        let count = self.descriptor.pixel_count;
        let pitch = self.descriptor.pixel_pitch_um;
        let gamma = 2.0 * std::f64::consts::LN_2.sqrt() / (signal.fwhm * pitch * count as f64);
        let start = -(count.div_ceil(2) as f64);
        let wavenumbers: Vec<(f64, f64)> = signal
            .peaks
            .iter()
            .map(|peak| {
                (
                    peak.amplitude / 2.0,
                    std::f64::consts::PI * signal.cutoff_wavelength_nm
                        / (pitch * peak.wavelength_nm),
                )
            })
            .collect();
        (0..count)
            .map(|k| {
                let x = pitch * (start + k as f64 + phase);
                let y: f64 = wavenumbers
                    .iter()
                    .map(|(amplitude, wavenumber)| amplitude * (1.0 + (wavenumber * x).cos()))
                    .sum();
                y * (-(x * gamma).powi(2)).exp()
            })
            .collect()
    }
}

impl CameraPort for SimulatedCamera {
    fn descriptor(&self) -> &CameraDescriptor {
        &self.descriptor
    }

    fn get_frame(&self) -> Result<Frame, CameraError> {
        let exposure_ms = self.open_state()?.exposure_ms;
        thread::sleep(Duration::from_secs_f64(exposure_ms / 1000.0));

        let mut state = self.open_state()?;
        let phase = state.rng.random::<f64>();
        let clean = self.fringes(&state.signal, phase);
        let gain = state.gain;
        let SimulatedState { rng, roi, .. } = &mut *state;
        let mut sample = |value: f64| ((gain * value + rng.random::<f64>() - 0.5) / 100.0).min(1.0);

        if self.rows == 1 {
            return Ok(Frame::Line(clean.iter().map(|&v| sample(v)).collect()));
        }

        let span = roi.bottom - roi.top + 1;
        let image = Array2::from_shape_fn((span, clean.len()), |(_, k)| sample(clean[k]));
        Ok(Frame::Area(bin_rows(&image, roi.bin)))
    }

    fn set_exposure(&self, exposure_ms: f64) -> Result<f64, CameraError> {
        let mut state = self.open_state()?;
        let applied = self.descriptor.exposure_ms.clamp(exposure_ms);
        if applied != state.exposure_ms {
            debug!("{}: exposure set to {} ms", self.descriptor.name, applied);
            state.exposure_ms = applied;
        }
        Ok(applied)
    }

    fn exposure(&self) -> f64 {
        self.lock().exposure_ms
    }

    fn set_gain(&self, gain: f64) -> Result<f64, CameraError> {
        let mut state = self.open_state()?;
        let applied = self.descriptor.gain.clamp(gain);
        if applied != state.gain {
            debug!("{}: gain set to {}", self.descriptor.name, applied);
            state.gain = applied;
        }
        Ok(applied)
    }

    fn gain(&self) -> f64 {
        self.lock().gain
    }

    fn roi_control(&self) -> Option<&dyn RoiControl> {
        self.descriptor.capabilities.roi.then_some(self as &dyn RoiControl)
    }

    fn temperature_control(&self) -> Option<&dyn TemperatureControl> {
        self.descriptor
            .capabilities
            .temperature_control
            .then_some(self as &dyn TemperatureControl)
    }

    fn simulation_control(&self) -> Option<&dyn SimulationControl> {
        Some(self as &dyn SimulationControl)
    }

    fn close(&self) -> Result<(), CameraError> {
        let mut state = self.lock();
        if !state.closed {
            debug!("{}: closed", self.descriptor.name);
            state.closed = true;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

impl RoiControl for SimulatedCamera {
    fn set_roi(&self, roi: Roi) -> Result<Roi, CameraError> {
        let mut state = self.open_state()?;
        let applied = roi.clamped(self.rows);
        state.roi = applied;
        Ok(applied)
    }

    fn roi(&self) -> Roi {
        self.lock().roi
    }
}

impl SimulationControl for SimulatedCamera {
    fn signal(&self) -> SimulatedSignal {
        self.lock().signal.clone()
    }

    fn set_lines(&self, peaks: Vec<SpectralPeak>, fwhm: f64) -> Result<(), CameraError> {
        let mut state = self.open_state()?;
        debug!(
            "{}: {} synthetic line(s), fwhm {}",
            self.descriptor.name,
            peaks.len(),
            fwhm
        );
        state.signal.peaks = peaks;
        state.signal.fwhm = fwhm;
        Ok(())
    }

    fn set_reference_wavelength(&self, cutoff_wavelength_nm: f64) -> Result<(), CameraError> {
        self.open_state()?.signal.cutoff_wavelength_nm = cutoff_wavelength_nm;
        Ok(())
    }
}

impl TemperatureControl for SimulatedCamera {
    /// The sensor relaxes exponentially from ambient towards the setpoint.
    fn temperature(&self) -> Result<TemperatureReading, CameraError> {
        let state = self.open_state()?;
        let elapsed = state.setpoint_changed.elapsed().as_secs_f64();
        let decay = (-elapsed / COOLING_TIME_CONSTANT.as_secs_f64()).exp();
        Ok(TemperatureReading {
            sensor_celsius: state.setpoint_celsius
                + (AMBIENT_CELSIUS - state.setpoint_celsius) * decay,
            setpoint_celsius: state.setpoint_celsius,
        })
    }

    fn set_temperature(&self, setpoint_celsius: f64) -> Result<(), CameraError> {
        let mut state = self.open_state()?;
        if setpoint_celsius != state.setpoint_celsius {
            state.setpoint_celsius = setpoint_celsius;
            state.setpoint_changed = Instant::now();
        }
        Ok(())
    }
}
