// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Axis configuration

use serde::{Deserialize, Serialize};

use crate::axis::AxisMapper;

/// Wavelengths used to build the presentation axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisConfig {
    /// Cutoff wavelength `λmin` of the long-pass filter, in nm
    pub cutoff_wavelength_nm: f64,
    /// Excitation wavelength `λ0`, in nm
    pub center_wavelength_nm: f64,
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            cutoff_wavelength_nm: 500.0,
            center_wavelength_nm: 532.0,
        }
    }
}

impl AxisConfig {
    pub fn mapper(&self) -> AxisMapper {
        AxisMapper::new(self.cutoff_wavelength_nm, self.center_wavelength_nm)
    }

    /// Check `0 < λmin < λ0`
    pub fn validate(&self) -> Result<(), String> {
        if !(self.cutoff_wavelength_nm > 0.0 && self.center_wavelength_nm > 0.0) {
            return Err(format!(
                "Wavelengths must be positive (cutoff {} nm, center {} nm)",
                self.cutoff_wavelength_nm, self.center_wavelength_nm
            ));
        }
        if self.cutoff_wavelength_nm >= self.center_wavelength_nm {
            return Err(format!(
                "Cutoff wavelength {} nm must be below the center wavelength {} nm",
                self.cutoff_wavelength_nm, self.center_wavelength_nm
            ));
        }
        Ok(())
    }
}
