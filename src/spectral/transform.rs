// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Zero-padded magnitude spectrum

use std::ops::Range;
use std::sync::Arc;

use log::debug;
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use serde::Serialize;

use super::SpectralError;
use crate::config::SpectralConfig;

/// Magnitudes over the configured index window of a padded transform
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectralFrame {
    /// `|X[j+1]| · numerator / N` for every `j` in `window`
    pub magnitudes: Vec<f64>,
    /// Index window into the positive-frequency half
    pub window: Range<usize>,
    /// Length of the unwindowed positive-frequency half (`F·N/2`)
    pub positive_bins: usize,
}

/// Forward plan and buffers for one padded length
struct ForwardPlan {
    size: usize,
    fft: Arc<dyn RealToComplex<f64>>,
    input: Vec<f64>,
    spectrum: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl ForwardPlan {
    fn new(planner: &mut RealFftPlanner<f64>, size: usize) -> Self {
        debug!("Planning forward FFT of length {}", size);
        let fft = planner.plan_fft_forward(size);
        Self {
            size,
            input: fft.make_input_vec(),
            spectrum: fft.make_output_vec(),
            scratch: fft.make_scratch_vec(),
            fft,
        }
    }
}

/// Computes the magnitude spectrum of averaged traces.
///
/// The transformer only caches FFT plans and work buffers; its output is a
/// pure function of the trace and the spectral settings. It is owned by the
/// acquisition worker and re-plans when the padded length changes.
pub struct SpectralTransformer {
    planner: RealFftPlanner<f64>,
    plan: Option<ForwardPlan>,
}

impl Default for SpectralTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralTransformer {
    pub fn new() -> Self {
        Self {
            planner: RealFftPlanner::new(),
            plan: None,
        }
    }

    /// Magnitude spectrum of `trace`.
    ///
    /// The trace of length `N` is zero-padded to `F·N`, transformed, and bins
    /// `1..=F·N/2` are kept (DC and the negative half are dropped). Each
    /// magnitude is scaled by `numerator/N` and the `[min, max)` window of
    /// `params` is returned.
    ///
    /// ### Parameters
    ///
    /// * `trace` - Averaged raw trace
    /// * `params` - Zero-pad factor, window and normalization
    ///
    /// ### Returns
    ///
    /// The windowed [`SpectralFrame`], or an error when the trace is empty or
    /// the window does not fit.
    pub fn magnitude_spectrum(
        &mut self,
        trace: &[f64],
        params: &SpectralConfig,
    ) -> Result<SpectralFrame, SpectralError> {
        let window = params.window(trace.len())?;
        let width = trace.len();
        let size = params.zero_pad_factor * width;

        if self.plan.as_ref().is_some_and(|plan| plan.size != size) {
            self.plan = None;
        }
        let planner = &mut self.planner;
        let plan = self
            .plan
            .get_or_insert_with(|| ForwardPlan::new(planner, size));

        plan.input[..width].copy_from_slice(trace);
        plan.input[width..].fill(0.0);
        plan.fft
            .process_with_scratch(&mut plan.input, &mut plan.spectrum, &mut plan.scratch)?;

        let scale = params.magnitude_numerator / width as f64;
        let magnitudes = plan.spectrum[window.start + 1..window.end + 1]
            .iter()
            .map(|bin| bin.norm() * scale)
            .collect();

        Ok(SpectralFrame {
            magnitudes,
            window,
            positive_bins: params.positive_bins(width),
        })
    }
}
