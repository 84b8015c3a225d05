// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Camera capability interface
//!
//! Every detector the acquisition engine can drive implements [`CameraPort`].
//! Implementations are shared between the control surface and the acquisition
//! worker through `Arc<dyn CameraPort>`, so all methods take `&self` and each
//! driver serializes its own hardware transactions behind an internal lock.
//!
//! Optional features (region of interest, cooling, synthetic signal) are
//! exposed as capability traits. Callers ask for them with
//! [`CameraPort::roi_control`], [`CameraPort::temperature_control`] and
//! [`CameraPort::simulation_control`] instead of invoking operations a device
//! does not support.
//!
//! ## Drivers
//!
//! - [`SimulatedCamera`]: synthetic interferograms, always available
//! - [`LineScanUsbCamera`]: TCD1304-based line sensor behind a vendor USB protocol
//! - [`AreaScanCamera`]: cooled area sensor behind a vendor SDK binding

pub mod area_scan;
pub mod line_scan;
pub mod registry;
pub mod simulated;

use std::fmt;
use std::time::Duration;

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use area_scan::{AreaScanCamera, AreaSdk};
pub use line_scan::{LineScanUsbCamera, UsbTransport};
pub use registry::{discover, CameraRegistry, DiscoveryReport, ProbeCandidate, ProbeOutcome};
pub use simulated::{SimulatedCamera, SimulatedSignal, SpectralPeak};

/// Errors raised by camera drivers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    /// The device (or its vendor library) is not present
    #[error("Camera not found: {0}")]
    NotFound(String),

    /// The vendor library reported a failure
    #[error("Driver error: {0}")]
    Driver(String),

    /// A command could not be written or was not acknowledged
    #[error("Command error: {0}")]
    Command(String),

    /// Frame data could not be read or failed its integrity check
    #[error("Data read error: {0}")]
    Io(String),

    /// No frame arrived within the allotted time
    #[error("Frame read timed out after {0:?}")]
    Timeout(Duration),

    /// The camera has been closed
    #[error("Camera '{0}' is closed")]
    Closed(String),

    /// The requested capability is not offered by this camera
    #[error("Camera '{camera}' does not support {capability}")]
    UnsupportedCapability {
        camera: String,
        capability: &'static str,
    },
}

/// Inclusive `[min, max]` range of a device setting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Clamp `value` into the range. NaN is mapped to `min`.
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        value.max(self.min).min(self.max)
    }
}

/// Optional features a camera may offer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub roi: bool,
    pub temperature_control: bool,
    pub simulated: bool,
}

/// Static description of a camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDescriptor {
    /// Human readable model name
    pub name: String,
    /// Number of pixels along the interferogram axis
    pub pixel_count: usize,
    /// Pixel pitch in µm
    pub pixel_pitch_um: f64,
    /// Accepted exposure times in ms
    pub exposure_ms: Bounds,
    /// Accepted analog gain values
    pub gain: Bounds,
    pub capabilities: Capabilities,
}

/// One readout of a detector
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Line sensor readout, one value per pixel
    Line(Vec<f64>),
    /// Area sensor readout, `rows × pixel_count`
    Area(Array2<f64>),
}

impl Frame {
    /// Number of pixels along the interferogram axis
    pub fn width(&self) -> usize {
        match self {
            Frame::Line(values) => values.len(),
            Frame::Area(image) => image.ncols(),
        }
    }

    pub fn rows(&self) -> usize {
        match self {
            Frame::Line(_) => 1,
            Frame::Area(image) => image.nrows(),
        }
    }

    pub fn is_area(&self) -> bool {
        matches!(self, Frame::Area(_))
    }

    /// Collapse the frame into a 1-D trace.
    ///
    /// Area frames are binned vertically: each output pixel is the sum of its
    /// column.
    pub fn to_trace(&self) -> Vec<f64> {
        match self {
            Frame::Line(values) => values.clone(),
            Frame::Area(image) => image.sum_axis(Axis(0)).to_vec(),
        }
    }
}

/// Sensor readout region: rows `top..=bottom`, summed by groups of `bin`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub top: usize,
    pub bottom: usize,
    pub bin: usize,
}

impl Roi {
    /// Full-height region with no binning
    pub fn full(height: usize) -> Self {
        Self {
            top: 0,
            bottom: height.saturating_sub(1),
            bin: 1,
        }
    }

    /// Clamp the region to a sensor of `height` rows.
    ///
    /// Rows are kept inside the sensor, `top <= bottom` is enforced by
    /// swapping, and `bin` is kept between 1 and the region height.
    pub fn clamped(self, height: usize) -> Self {
        let last = height.saturating_sub(1);
        let (mut top, mut bottom) = (self.top.min(last), self.bottom.min(last));
        if top > bottom {
            std::mem::swap(&mut top, &mut bottom);
        }
        let span = bottom - top + 1;
        Self {
            top,
            bottom,
            bin: self.bin.clamp(1, span),
        }
    }

    /// Number of output rows after binning
    pub fn output_rows(&self) -> usize {
        let span = self.bottom.saturating_sub(self.top) + 1;
        span.div_ceil(self.bin.max(1))
    }
}

/// Region-of-interest capability of area sensors
pub trait RoiControl: Send + Sync {
    /// Apply a region; returns the region actually programmed
    fn set_roi(&self, roi: Roi) -> Result<Roi, CameraError>;
    fn roi(&self) -> Roi;
}

/// Sensor and setpoint temperatures in °C
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureReading {
    pub sensor_celsius: f64,
    pub setpoint_celsius: f64,
}

/// Cooling capability of cooled sensors
pub trait TemperatureControl: Send + Sync {
    fn temperature(&self) -> Result<TemperatureReading, CameraError>;
    fn set_temperature(&self, setpoint_celsius: f64) -> Result<(), CameraError>;
}

/// Synthetic-signal capability of simulated cameras
pub trait SimulationControl: Send + Sync {
    fn signal(&self) -> SimulatedSignal;

    /// Replace the emission lines and envelope width. The reference
    /// wavelength is kept.
    fn set_lines(&self, peaks: Vec<SpectralPeak>, fwhm: f64) -> Result<(), CameraError>;

    /// Refer the fringe frequencies to a new cutoff wavelength `λmin` (nm)
    fn set_reference_wavelength(&self, cutoff_wavelength_nm: f64) -> Result<(), CameraError>;
}

/// Uniform capability interface over all detectors.
///
/// ### Contract
///
/// * `get_frame` blocks for roughly one exposure and returns a frame whose
///   width equals `descriptor().pixel_count`.
/// * `set_exposure` and `set_gain` clamp to the descriptor bounds, return the
///   applied value, and do not touch the device when the clamped value equals
///   the current one.
/// * `close` is idempotent. Every later operation fails with
///   [`CameraError::Closed`].
pub trait CameraPort: Send + Sync {
    fn descriptor(&self) -> &CameraDescriptor;

    /// Acquire one frame
    fn get_frame(&self) -> Result<Frame, CameraError>;

    /// Set the exposure time in ms and return the applied value
    fn set_exposure(&self, exposure_ms: f64) -> Result<f64, CameraError>;

    /// Current exposure time in ms
    fn exposure(&self) -> f64;

    /// Set the analog gain and return the applied value
    fn set_gain(&self, gain: f64) -> Result<f64, CameraError>;

    fn gain(&self) -> f64;

    fn roi_control(&self) -> Option<&dyn RoiControl> {
        None
    }

    fn temperature_control(&self) -> Option<&dyn TemperatureControl> {
        None
    }

    fn simulation_control(&self) -> Option<&dyn SimulationControl> {
        None
    }

    /// Release the device
    fn close(&self) -> Result<(), CameraError>;

    fn is_closed(&self) -> bool;
}

impl fmt::Debug for dyn CameraPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CameraPort")
            .field("name", &self.descriptor().name)
            .field("pixel_count", &self.descriptor().pixel_count)
            .finish()
    }
}

/// Sum groups of `bin` consecutive rows; the last group may be shorter.
pub(crate) fn bin_rows(image: &Array2<f64>, bin: usize) -> Array2<f64> {
    let bin = bin.max(1);
    if bin == 1 {
        return image.clone();
    }
    let rows = image.nrows().div_ceil(bin);
    let mut binned = Array2::<f64>::zeros((rows, image.ncols()));
    for (index, chunk) in image.axis_chunks_iter(Axis(0), bin).enumerate() {
        binned.row_mut(index).assign(&chunk.sum_axis(Axis(0)));
    }
    binned
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_bounds_clamp() {
        let bounds = Bounds::new(0.1, 1000.0);
        assert_eq!(bounds.clamp(0.0), 0.1);
        assert_eq!(bounds.clamp(5000.0), 1000.0);
        assert_eq!(bounds.clamp(12.5), 12.5);
        assert_eq!(bounds.clamp(f64::NAN), 0.1);
    }

    #[test]
    fn test_area_frame_is_binned_vertically() {
        let frame = Frame::Area(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
        assert_eq!(frame.width(), 3);
        assert_eq!(frame.rows(), 2);
        assert!(frame.is_area());
        assert_eq!(frame.to_trace(), vec![5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_line_frame_trace() {
        let frame = Frame::Line(vec![1.0, 2.0]);
        assert_eq!(frame.rows(), 1);
        assert_eq!(frame.to_trace(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_roi_clamping() {
        let roi = Roi {
            top: 90,
            bottom: 10,
            bin: 500,
        }
        .clamped(64);
        assert_eq!(
            roi,
            Roi {
                top: 10,
                bottom: 63,
                bin: 54
            }
        );
        assert_eq!(roi.output_rows(), 1);
        assert_eq!(Roi::full(64).output_rows(), 64);
    }

    #[test]
    fn test_bin_rows_keeps_partial_group() {
        let image = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let binned = bin_rows(&image, 2);
        assert_eq!(binned, array![[3.0, 3.0], [3.0, 3.0]]);
    }
}
