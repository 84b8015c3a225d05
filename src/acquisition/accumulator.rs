// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rolling accumulation buffer
//!
//! Holds the last `depth` raw traces of one camera in a circular
//! `depth × width` matrix together with their column sums, so the average is
//! available in `O(width)` after every push.

use log::debug;
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Circular buffer of raw traces with a running average.
///
/// Rows that have never been written are zero and still count towards the
/// average, so the first `depth - 1` averages ramp up from zero.
#[derive(Debug, Clone)]
pub struct FrameAccumulator {
    frames: Array2<f64>,
    sums: Array1<f64>,
    cursor: usize,
    pushes: u64,
}

impl FrameAccumulator {
    /// Create a zero-filled buffer. A depth of 0 is treated as 1.
    pub fn new(depth: usize, width: usize) -> Self {
        let depth = depth.max(1);
        Self {
            frames: Array2::zeros((depth, width)),
            sums: Array1::zeros(width),
            cursor: 0,
            pushes: 0,
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.nrows()
    }

    pub fn width(&self) -> usize {
        self.frames.ncols()
    }

    /// Slot the next push writes to
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of slots holding a pushed trace
    pub fn filled(&self) -> usize {
        self.pushes.min(self.depth() as u64) as usize
    }

    /// Write `frame` into the current slot and advance the cursor.
    ///
    /// A frame whose length differs from the buffer width is dropped without
    /// touching the buffer; `false` is returned in that case.
    pub fn push(&mut self, frame: &[f64]) -> bool {
        if frame.len() != self.width() {
            debug!(
                "Dropping {}-pixel frame, buffer expects {}",
                frame.len(),
                self.width()
            );
            return false;
        }

        let incoming = ArrayView1::from(frame);
        let mut slot = self.frames.row_mut(self.cursor);
        self.sums -= &slot;
        self.sums += &incoming;
        slot.assign(&incoming);

        self.cursor = (self.cursor + 1) % self.depth();
        self.pushes += 1;
        if self.cursor == 0 {
            // Rebuild the running sum once per lap to shed rounding drift
            self.sums = self.frames.sum_axis(Axis(0));
        }
        true
    }

    /// Element-wise mean over all `depth` slots
    pub fn average(&self) -> Vec<f64> {
        (&self.sums / self.depth() as f64).to_vec()
    }

    /// Reallocate as a zero-filled `depth × width` buffer with the cursor at 0
    pub fn reset(&mut self, depth: usize, width: usize) {
        *self = Self::new(depth, width);
    }

    /// Trace stored in `slot`, if the slot exists
    pub fn frame(&self, slot: usize) -> Option<ArrayView1<'_, f64>> {
        (slot < self.depth()).then(|| self.frames.row(slot))
    }
}
