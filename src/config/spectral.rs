// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Spectral transform configuration

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::spectral::{SpectralError, DEFAULT_MAGNITUDE_NUMERATOR, DEFAULT_ZERO_PAD_FACTOR};

/// Parameters of the zero-padded magnitude spectrum.
///
/// The window `[min_frequency_index, max_frequency_index)` indexes the
/// positive-frequency half of the padded transform, which holds
/// `zero_pad_factor · width / 2` bins for a trace of `width` pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralConfig {
    /// The trace is zero-padded to `zero_pad_factor` times its length
    pub zero_pad_factor: usize,

    /// First published bin
    pub min_frequency_index: usize,

    /// End of the published window (exclusive). `None` publishes up to the
    /// end of the positive-frequency half.
    pub max_frequency_index: Option<usize>,

    /// Magnitudes are scaled by `magnitude_numerator / width`.
    ///
    /// The numerator is independent of `zero_pad_factor`: changing the pad
    /// factor does not rescale it. The default matches the default factor of 8.
    pub magnitude_numerator: f64,
}

impl Default for SpectralConfig {
    fn default() -> Self {
        Self {
            zero_pad_factor: DEFAULT_ZERO_PAD_FACTOR,
            min_frequency_index: 0,
            max_frequency_index: None,
            magnitude_numerator: DEFAULT_MAGNITUDE_NUMERATOR,
        }
    }
}

impl SpectralConfig {
    /// Number of positive-frequency bins for a trace of `width` pixels
    pub fn positive_bins(&self, width: usize) -> usize {
        self.zero_pad_factor * width / 2
    }

    /// Resolve the published window for a trace of `width` pixels.
    ///
    /// `max_frequency_index` may not exceed `zero_pad_factor · width`; the
    /// resolved end is then clamped to the positive-frequency half, and the
    /// window must not be empty.
    pub fn window(&self, width: usize) -> Result<Range<usize>, SpectralError> {
        if width == 0 {
            return Err(SpectralError::EmptyTrace);
        }
        if self.zero_pad_factor < 2 {
            return Err(SpectralError::InvalidPadFactor(self.zero_pad_factor));
        }
        let limit = self.zero_pad_factor * width;
        let invalid = || SpectralError::InvalidWindow {
            min: self.min_frequency_index,
            max: self.max_frequency_index,
            width,
            limit,
        };
        if self.max_frequency_index.is_some_and(|max| max > limit) {
            return Err(invalid());
        }
        let bins = self.positive_bins(width);
        let end = self.max_frequency_index.unwrap_or(bins).min(bins);
        if self.min_frequency_index >= end {
            return Err(invalid());
        }
        Ok(self.min_frequency_index..end)
    }
}
