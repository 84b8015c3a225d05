// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Camera configuration
//!
//! Initial exposure and gain applied to whichever camera gets selected, and
//! the set of simulated cameras offered next to the hardware probes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::camera::{CameraPort, ProbeCandidate, SimulatedCamera, SimulatedSignal, SpectralPeak};

/// Geometry of a simulated detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedCameraConfig {
    pub id: String,
    pub pixel_count: usize,
    pub pixel_pitch_um: f64,
    /// Sensor rows; more than one emulates an area sensor
    #[serde(default = "default_rows")]
    pub rows: usize,
}

fn default_rows() -> usize {
    1
}

/// Synthetic spectrum shared by all simulated cameras
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedSignalConfig {
    pub peaks: Vec<SpectralPeak>,
    /// Envelope width as a fraction of the sensor length
    pub fwhm: f64,
}

impl Default for SimulatedSignalConfig {
    fn default() -> Self {
        let signal = SimulatedSignal::default();
        Self {
            peaks: signal.peaks,
            fwhm: signal.fwhm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Exposure applied on camera selection, in ms
    pub exposure_ms: f64,
    /// Gain applied on camera selection
    pub gain: f64,
    pub simulated: Vec<SimulatedCameraConfig>,
    pub signal: SimulatedSignalConfig,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let geometry = |id: &str, pixel_count, pixel_pitch_um| SimulatedCameraConfig {
            id: id.to_string(),
            pixel_count,
            pixel_pitch_um,
            rows: 1,
        };
        Self {
            exposure_ms: 10.0,
            gain: 1.0,
            simulated: vec![
                geometry("1024x26um", 1024, 26.0),
                geometry("2048x6.5um", 2048, 6.5),
                geometry("2048x14um", 2048, 14.0),
                geometry("3648x8.0um", 3648, 8.0),
            ],
            signal: SimulatedSignalConfig::default(),
        }
    }
}

impl CameraConfig {
    /// Discovery probes for the configured simulated cameras.
    ///
    /// ### Parameters
    ///
    /// * `cutoff_wavelength_nm` - `λmin` the synthetic fringes are referred to
    pub fn simulated_candidates(&self, cutoff_wavelength_nm: f64) -> Vec<ProbeCandidate> {
        self.simulated
            .iter()
            .map(|camera| {
                let camera = camera.clone();
                let signal = SimulatedSignal {
                    cutoff_wavelength_nm,
                    peaks: self.signal.peaks.clone(),
                    fwhm: self.signal.fwhm,
                };
                ProbeCandidate::new(camera.id.clone(), move || {
                    let name = format!(
                        "Simulated {}x{}um",
                        camera.pixel_count, camera.pixel_pitch_um
                    );
                    let port: Arc<dyn CameraPort> = Arc::new(SimulatedCamera::new(
                        &name,
                        camera.pixel_count,
                        camera.pixel_pitch_um,
                        camera.rows,
                        signal,
                    ));
                    Ok(port)
                })
            })
            .collect()
    }
}
