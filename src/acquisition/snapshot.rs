// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Acquisition snapshots
//!
//! The control surface never mutates what the worker is using. Each
//! reconfiguration builds a new immutable [`AcquisitionSnapshot`] and swaps it
//! into the [`SnapshotCell`]. The worker loads the current snapshot before a
//! frame read and again afterwards; identity of the camera and buffer
//! (`Arc::ptr_eq`) tells it whether the frame still belongs to the current
//! configuration.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use super::accumulator::FrameAccumulator;
use crate::axis::PresentationAxes;
use crate::camera::CameraPort;
use crate::config::{AxisConfig, Config, SpectralConfig};

/// Processing parameters the worker reads on every cycle
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingSettings {
    pub spectral: SpectralConfig,
    pub axis: AxisConfig,
    /// High-pass cutoff bin, `None` when the filter is disabled
    pub highpass_cutoff: Option<usize>,
}

impl ProcessingSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            spectral: config.spectral.clone(),
            axis: config.axis,
            highpass_cutoff: config
                .acquisition
                .highpass
                .enabled
                .then(|| config.highpass_cutoff_bin()),
        }
    }
}

/// Immutable view of the acquisition configuration
pub struct AcquisitionSnapshot {
    /// Increases with every published snapshot
    pub generation: u64,
    pub camera_id: String,
    pub camera: Arc<dyn CameraPort>,
    pub buffer: Arc<Mutex<FrameAccumulator>>,
    pub settings: Arc<ProcessingSettings>,
    pub axes: Arc<PresentationAxes>,
}

impl AcquisitionSnapshot {
    /// Whether both snapshots feed the same camera into the same buffer
    pub fn same_source(&self, other: &AcquisitionSnapshot) -> bool {
        Arc::ptr_eq(&self.camera, &other.camera) && Arc::ptr_eq(&self.buffer, &other.buffer)
    }

    pub fn lock_buffer(&self) -> MutexGuard<'_, FrameAccumulator> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for AcquisitionSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AcquisitionSnapshot")
            .field("generation", &self.generation)
            .field("camera_id", &self.camera_id)
            .field("camera", &self.camera)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Holder of the current snapshot
#[derive(Default)]
pub struct SnapshotCell {
    current: RwLock<Option<Arc<AcquisitionSnapshot>>>,
    generation: AtomicU64,
}

impl SnapshotCell {
    pub fn load(&self) -> Option<Arc<AcquisitionSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Generation number for the next snapshot
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Replace the current snapshot
    pub fn store(&self, snapshot: AcquisitionSnapshot) -> Arc<AcquisitionSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(snapshot.clone());
        snapshot
    }
}
