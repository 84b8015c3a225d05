// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Cooled area-scan camera driven through a vendor SDK
//!
//! The SDK binding is external and reached through [`AreaSdk`]. The camera
//! reads out a programmable band of rows, optionally binned on chip, and
//! returns 16-bit counts that are normalized to `[0, 1]`.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, info};
use ndarray::Array2;

use super::{
    Bounds, CameraDescriptor, CameraError, CameraPort, Capabilities, Frame, Roi, RoiControl,
    TemperatureControl, TemperatureReading,
};

/// Extra time granted to the SDK on top of the exposure
const READOUT_MARGIN: Duration = Duration::from_secs(2);
const FULL_SCALE: f64 = 65535.0;

/// Operations of the vendor SDK used by [`AreaScanCamera`]
#[cfg_attr(test, mockall::automock)]
pub trait AreaSdk: Send {
    fn model(&self) -> String;
    /// Sensor size as `(width, height)` in pixels
    fn sensor_size(&self) -> (usize, usize);
    fn pixel_pitch_um(&self) -> f64;
    fn exposure_limits_ms(&self) -> (f64, f64);
    fn gain_limits(&self) -> (f64, f64);
    fn set_exposure(&mut self, exposure_ms: f64) -> Result<(), CameraError>;
    fn set_gain(&mut self, gain: f64) -> Result<(), CameraError>;
    fn set_readout(&mut self, roi: Roi) -> Result<(), CameraError>;
    /// Acquire one image, row-major, `roi.output_rows() × width` counts
    fn acquire(&mut self, timeout: Duration) -> Result<Vec<u16>, CameraError>;
    fn sensor_temperature(&mut self) -> Result<f64, CameraError>;
    fn set_temperature_setpoint(&mut self, celsius: f64) -> Result<(), CameraError>;
    fn shutdown(&mut self) -> Result<(), CameraError>;
}

struct AreaState {
    sdk: Option<Box<dyn AreaSdk>>,
    exposure_ms: f64,
    gain: f64,
    roi: Roi,
    setpoint_celsius: f64,
}

/// Area sensor with ROI and cooling capabilities
pub struct AreaScanCamera {
    descriptor: CameraDescriptor,
    height: usize,
    state: Mutex<AreaState>,
}

impl AreaScanCamera {
    /// Wrap an initialised SDK session and program a full-frame readout.
    pub fn open(mut sdk: Box<dyn AreaSdk>) -> Result<Self, CameraError> {
        let (width, height) = sdk.sensor_size();
        let (min_exposure, max_exposure) = sdk.exposure_limits_ms();
        let (min_gain, max_gain) = sdk.gain_limits();
        let descriptor = CameraDescriptor {
            name: sdk.model(),
            pixel_count: width,
            pixel_pitch_um: sdk.pixel_pitch_um(),
            exposure_ms: Bounds::new(min_exposure, max_exposure),
            gain: Bounds::new(min_gain, max_gain),
            capabilities: Capabilities {
                roi: true,
                temperature_control: true,
                simulated: false,
            },
        };

        let roi = Roi::full(height);
        sdk.set_readout(roi)?;
        let exposure_ms = descriptor.exposure_ms.clamp(10.0);
        sdk.set_exposure(exposure_ms)?;
        let gain = descriptor.gain.clamp(1.0);
        sdk.set_gain(gain)?;
        let setpoint_celsius = sdk.sensor_temperature()?;

        info!(
            "Opened {} ({}x{} px, {} µm)",
            descriptor.name, width, height, descriptor.pixel_pitch_um
        );
        Ok(Self {
            descriptor,
            height,
            state: Mutex::new(AreaState {
                sdk: Some(sdk),
                exposure_ms,
                gain,
                roi,
                setpoint_celsius,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, AreaState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn closed(&self) -> CameraError {
        CameraError::Closed(self.descriptor.name.clone())
    }
}

impl CameraPort for AreaScanCamera {
    fn descriptor(&self) -> &CameraDescriptor {
        &self.descriptor
    }

    fn get_frame(&self) -> Result<Frame, CameraError> {
        let mut state = self.lock();
        let rows = state.roi.output_rows();
        let timeout = Duration::from_secs_f64(state.exposure_ms / 1000.0) + READOUT_MARGIN;
        let sdk = state.sdk.as_deref_mut().ok_or_else(|| self.closed())?;

        let counts = sdk.acquire(timeout)?;
        let width = self.descriptor.pixel_count;
        if counts.len() != rows * width {
            return Err(CameraError::Io(format!(
                "expected {}x{} pixels, got {}",
                rows,
                width,
                counts.len()
            )));
        }
        let image = Array2::from_shape_vec(
            (rows, width),
            counts.iter().map(|&c| c as f64 / FULL_SCALE).collect(),
        )
        .map_err(|e| CameraError::Io(e.to_string()))?;
        Ok(Frame::Area(image))
    }

    fn set_exposure(&self, exposure_ms: f64) -> Result<f64, CameraError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let applied = self.descriptor.exposure_ms.clamp(exposure_ms);
        let sdk = state.sdk.as_deref_mut().ok_or_else(|| self.closed())?;
        if applied != state.exposure_ms {
            sdk.set_exposure(applied)?;
            debug!("{}: exposure set to {} ms", self.descriptor.name, applied);
            state.exposure_ms = applied;
        }
        Ok(applied)
    }

    fn exposure(&self) -> f64 {
        self.lock().exposure_ms
    }

    fn set_gain(&self, gain: f64) -> Result<f64, CameraError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let applied = self.descriptor.gain.clamp(gain);
        let sdk = state.sdk.as_deref_mut().ok_or_else(|| self.closed())?;
        if applied != state.gain {
            sdk.set_gain(applied)?;
            state.gain = applied;
        }
        Ok(applied)
    }

    fn gain(&self) -> f64 {
        self.lock().gain
    }

    fn roi_control(&self) -> Option<&dyn RoiControl> {
        Some(self)
    }

    fn temperature_control(&self) -> Option<&dyn TemperatureControl> {
        Some(self)
    }

    fn close(&self) -> Result<(), CameraError> {
        let sdk = self.lock().sdk.take();
        match sdk {
            Some(mut sdk) => {
                debug!("{}: shutting down SDK session", self.descriptor.name);
                sdk.shutdown()
            }
            None => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.lock().sdk.is_none()
    }
}

impl RoiControl for AreaScanCamera {
    fn set_roi(&self, roi: Roi) -> Result<Roi, CameraError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let applied = roi.clamped(self.height);
        let sdk = state.sdk.as_deref_mut().ok_or_else(|| self.closed())?;
        if applied != state.roi {
            sdk.set_readout(applied)?;
            state.roi = applied;
        }
        Ok(applied)
    }

    fn roi(&self) -> Roi {
        self.lock().roi
    }
}

impl TemperatureControl for AreaScanCamera {
    fn temperature(&self) -> Result<TemperatureReading, CameraError> {
        let mut state = self.lock();
        let setpoint_celsius = state.setpoint_celsius;
        let sdk = state.sdk.as_deref_mut().ok_or_else(|| self.closed())?;
        Ok(TemperatureReading {
            sensor_celsius: sdk.sensor_temperature()?,
            setpoint_celsius,
        })
    }

    fn set_temperature(&self, setpoint_celsius: f64) -> Result<(), CameraError> {
        let mut state = self.lock();
        let sdk = state.sdk.as_deref_mut().ok_or_else(|| self.closed())?;
        sdk.set_temperature_setpoint(setpoint_celsius)?;
        state.setpoint_celsius = setpoint_celsius;
        Ok(())
    }
}
