// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).
//!
//! Spectral analysis module
//!
//! This module turns an averaged interferogram into the magnitude spectrum
//! published with every processed trace.

mod transform;

use thiserror::Error;

pub use transform::{SpectralFrame, SpectralTransformer};

/// Default zero-padding factor (the trace is extended to `8·N` samples)
pub const DEFAULT_ZERO_PAD_FACTOR: usize = 8;

/// Default magnitude normalization numerator; spectra are scaled by `7.5/N`.
///
/// The value is not derived from the zero-pad factor and stays the same when
/// that factor changes.
pub const DEFAULT_MAGNITUDE_NUMERATOR: f64 = 7.5;

/// Errors raised by the spectral and filtering stages
#[derive(Error, Debug)]
pub enum SpectralError {
    #[error("Cannot transform an empty trace")]
    EmptyTrace,

    #[error("Zero-pad factor must be at least 2, got {0}")]
    InvalidPadFactor(usize),

    #[error("Invalid frequency window [{min}, {max:?}) for a {width}-pixel trace (limit {limit})")]
    InvalidWindow {
        min: usize,
        max: Option<usize>,
        width: usize,
        limit: usize,
    },

    #[error("FFT failed: {0}")]
    Fft(#[from] realfft::FftError),
}
