// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # FT-Raman acquisition engine
//!
//! Continuous acquisition and spectral processing for Fourier transform Raman
//! spectrometers built around line-scan or area-scan cameras.
//!
//! A single background worker pulls frames from the selected camera, keeps a
//! rolling average of the last `N` traces, turns the average into a
//! zero-padded magnitude spectrum and publishes every processed trace with its
//! presentation axes (detector position, wavelength, Raman shift).
//!
//! ## Modules
//!
//! - `axis`: Conversions between detector frequency, wavelength and Raman shift
//! - `camera`: Camera capability interface, drivers and discovery
//! - `acquisition`: Accumulation buffer, acquisition controller and result stream
//! - `spectral`: Zero-padded magnitude spectrum
//! - `preprocessing`: Optional high-pass filtering of raw traces
//! - `config`: YAML configuration with JSON schema validation
//! - `daemon`: Worker thread ownership, failure policy and shutdown ordering

pub mod acquisition;
pub mod axis;
pub mod camera;
pub mod config;
pub mod daemon;
pub mod preprocessing;
pub mod spectral;

pub use acquisition::{
    AcquisitionController, AcquisitionState, ControlError, ControlHandle, ProcessedTrace,
    ResultSink, SharedSpectrumStream,
};
pub use axis::{AxisMapper, PresentationAxes};
pub use camera::{CameraDescriptor, CameraError, CameraPort, Frame};
pub use config::Config;
pub use daemon::Daemon;
pub use spectral::{SpectralError, SpectralFrame, SpectralTransformer};
