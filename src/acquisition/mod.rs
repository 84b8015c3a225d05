// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Acquisition module
//!
//! This module holds the continuous acquisition pipeline: the rolling
//! accumulation buffer, the snapshot-based controller that drives a camera,
//! and the stream through which processed traces reach their consumers.

pub mod accumulator;
pub mod controller;
pub mod snapshot;
pub mod stream;

pub use accumulator::FrameAccumulator;
pub use controller::{
    AcquisitionController, AcquisitionState, ControlError, ControlHandle, Cycle, Fault, FrameError,
    StopReason,
};
pub use snapshot::{AcquisitionSnapshot, ProcessingSettings, SnapshotCell};
pub use stream::{
    ImageFrame, ProcessedTrace, ResultSink, SharedSpectrumStream, SpectrumExport, SpectrumPoint,
    SpectrumStreamConsumer, StreamStats,
};
