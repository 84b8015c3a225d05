// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! FFT high-pass filter for raw traces

use std::sync::Arc;

use log::debug;
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::spectral::SpectralError;

/// Trait for implementing trace filters
pub trait Filter: Send {
    /// Apply the filter to a trace and return the filtered trace
    fn apply(&mut self, signal: &[f64]) -> Result<Vec<f64>, SpectralError>;
}

struct HighpassPlan {
    size: usize,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
    input: Vec<f64>,
    spectrum: Vec<Complex<f64>>,
    output: Vec<f64>,
    forward_scratch: Vec<Complex<f64>>,
    inverse_scratch: Vec<Complex<f64>>,
}

impl HighpassPlan {
    fn new(planner: &mut RealFftPlanner<f64>, size: usize) -> Self {
        debug!("Planning high-pass FFT pair of length {}", size);
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        Self {
            size,
            input: forward.make_input_vec(),
            spectrum: forward.make_output_vec(),
            output: inverse.make_output_vec(),
            forward_scratch: forward.make_scratch_vec(),
            inverse_scratch: inverse.make_scratch_vec(),
            forward,
            inverse,
        }
    }
}

/// Removes DC and slow baseline drift from a trace.
///
/// The trace is transformed with a real FFT, bins `[0, cutoff_bin)` are
/// zeroed and the result is transformed back, giving a trace of the same
/// length.
pub struct HighpassFilter {
    cutoff_bin: usize,
    planner: RealFftPlanner<f64>,
    plan: Option<HighpassPlan>,
}

impl HighpassFilter {
    pub fn new(cutoff_bin: usize) -> Self {
        Self {
            cutoff_bin,
            planner: RealFftPlanner::new(),
            plan: None,
        }
    }

    pub fn cutoff_bin(&self) -> usize {
        self.cutoff_bin
    }

    pub fn set_cutoff_bin(&mut self, cutoff_bin: usize) {
        self.cutoff_bin = cutoff_bin;
    }
}

impl Filter for HighpassFilter {
    fn apply(&mut self, signal: &[f64]) -> Result<Vec<f64>, SpectralError> {
        let size = signal.len();
        if size == 0 {
            return Err(SpectralError::EmptyTrace);
        }

        if self.plan.as_ref().is_some_and(|plan| plan.size != size) {
            self.plan = None;
        }
        let planner = &mut self.planner;
        let plan = self
            .plan
            .get_or_insert_with(|| HighpassPlan::new(planner, size));

        plan.input.copy_from_slice(signal);
        plan.forward.process_with_scratch(
            &mut plan.input,
            &mut plan.spectrum,
            &mut plan.forward_scratch,
        )?;

        let cut = self.cutoff_bin.min(plan.spectrum.len());
        plan.spectrum[..cut].fill(Complex::new(0.0, 0.0));
        // The inverse transform requires purely real DC and Nyquist bins.
        plan.spectrum[0].im = 0.0;
        if size % 2 == 0 {
            if let Some(nyquist) = plan.spectrum.last_mut() {
                nyquist.im = 0.0;
            }
        }

        plan.inverse.process_with_scratch(
            &mut plan.spectrum,
            &mut plan.output,
            &mut plan.inverse_scratch,
        )?;

        let scale = size as f64;
        Ok(plan.output.iter().map(|value| value / scale).collect())
    }
}
