// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Presentation axes
//!
//! The interferogram recorded by the detector is a superposition of fringes.
//! Once transformed, spectral bin `j` corresponds to a fringe frequency that is
//! inversely proportional to the optical wavelength, scaled by the cutoff
//! wavelength `λmin` of the filter in front of the interferometer. This module
//! maps those bins onto wavelengths (nm) and Raman shifts (cm⁻¹) relative to the
//! excitation line `λ0`, and the detector pixels onto positions in millimetres.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Conversion factor between nm⁻¹ and cm⁻¹.
pub const RAMAN_SCALE: f64 = 1e7;

/// Guarded reciprocal: `1/x`, or `0` when `x` is exactly zero.
///
/// ```
/// use rust_ftraman::axis::inverse;
/// assert_eq!(inverse(4.0), 0.25);
/// assert_eq!(inverse(0.0), 0.0);
/// ```
pub fn inverse(x: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        1.0 / x
    }
}

/// Maps detector frequencies onto wavelength and Raman shift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisMapper {
    /// Cutoff wavelength `λmin` in nm
    pub cutoff_wavelength_nm: f64,
    /// Excitation (center) wavelength `λ0` in nm
    pub center_wavelength_nm: f64,
}

impl AxisMapper {
    pub fn new(cutoff_wavelength_nm: f64, center_wavelength_nm: f64) -> Self {
        Self {
            cutoff_wavelength_nm,
            center_wavelength_nm,
        }
    }

    /// Raman shift in cm⁻¹ of a wavelength in nm: `1e7 · (1/λ0 − 1/λ)`.
    pub fn raman_shift(&self, wavelength_nm: f64) -> f64 {
        RAMAN_SCALE * (inverse(self.center_wavelength_nm) - inverse(wavelength_nm))
    }

    /// Wavelength in nm for a Raman shift in cm⁻¹: `1 / (1/λ0 − Δ/1e7)`.
    pub fn wavelength_from_shift(&self, shift_cm1: f64) -> f64 {
        inverse(inverse(self.center_wavelength_nm) - shift_cm1 / RAMAN_SCALE)
    }

    /// Wavelength of each of the `len` positive-frequency bins.
    ///
    /// The reciprocal wavelengths form the first `len` points of an evenly
    /// spaced grid of `2·len` points from `1/(len·λmin)` to `2/λmin`, so bin
    /// `j` sits at `len·λmin/(j+1)` and the last bin lands on `λmin`.
    pub fn wavelength_axis(&self, len: usize) -> Vec<f64> {
        if len == 0 {
            return Vec::new();
        }
        let points = 2 * len;
        let start = inverse(len as f64 * self.cutoff_wavelength_nm);
        let stop = 2.0 * inverse(self.cutoff_wavelength_nm);
        let step = (stop - start) / (points - 1) as f64;
        (0..len)
            .map(|j| inverse(start + step * j as f64))
            .collect()
    }

    /// Raman shift of each wavelength in `wavelengths_nm`.
    pub fn raman_axis(&self, wavelengths_nm: &[f64]) -> Vec<f64> {
        wavelengths_nm
            .iter()
            .map(|&wavelength| self.raman_shift(wavelength))
            .collect()
    }
}

/// Pixel centre positions in mm, centred on the middle of the detector.
///
/// Pixel `k` of `n` with a pitch `p` µm sits at `(k + 0.5 − n/2) · p / 1000`.
pub fn position_axis(pixel_count: usize, pixel_pitch_um: f64) -> Vec<f64> {
    let half = pixel_count as f64 / 2.0;
    (0..pixel_count)
        .map(|k| (k as f64 + 0.5 - half) * pixel_pitch_um / 1000.0)
        .collect()
}

/// Vertical display range `(low, high)` for a plotted series.
///
/// The series maximum is scaled by 1.3 and clamped to `[floor, ceiling]`; the
/// range then spans `-1 %` to `+1 %` around `[0, that value]`. Raw traces use
/// a floor of `1e-3` and a ceiling of 1, spectra a floor of `1e-4` and no
/// ceiling.
pub fn auto_scale(values: &[f64], floor: f64, ceiling: Option<f64>) -> (f64, f64) {
    let peak = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut top = (1.3 * peak).max(floor);
    if let Some(ceiling) = ceiling {
        top = top.min(ceiling);
    }
    (-0.01 * top, 1.01 * top)
}

/// Axes accompanying every processed trace.
///
/// The spectral axes are computed over the full positive-frequency range and
/// then cut to the same `[min, max)` window as the spectral frame, so index `i`
/// of `wavelength_nm` describes index `i` of the published magnitudes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationAxes {
    pub position_mm: Vec<f64>,
    pub wavelength_nm: Vec<f64>,
    pub raman_shift_cm1: Vec<f64>,
    pub window: Range<usize>,
}

impl PresentationAxes {
    /// Build the axes for a detector and a spectral window.
    ///
    /// ### Parameters
    ///
    /// * `pixel_count` - Width of the traces produced by the camera
    /// * `pixel_pitch_um` - Detector pixel pitch in µm
    /// * `positive_bins` - Length of the unwindowed spectrum (`F·N/2`)
    /// * `window` - Spectral window, already clamped to `positive_bins`
    /// * `mapper` - Cutoff and center wavelengths
    pub fn build(
        pixel_count: usize,
        pixel_pitch_um: f64,
        positive_bins: usize,
        window: Range<usize>,
        mapper: &AxisMapper,
    ) -> Self {
        let full = mapper.wavelength_axis(positive_bins);
        let start = window.start.min(full.len());
        let end = window.end.clamp(start, full.len());
        let wavelength_nm = full[start..end].to_vec();
        let raman_shift_cm1 = mapper.raman_axis(&wavelength_nm);
        Self {
            position_mm: position_axis(pixel_count, pixel_pitch_um),
            wavelength_nm,
            raman_shift_cm1,
            window: start..end,
        }
    }
}
