// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Camera discovery and registry
//!
//! Discovery runs a list of named probes. Each probe either yields an opened
//! camera or explains why none was found; the outcome of every probe is kept
//! in a [`DiscoveryReport`] so the front-end can show why a device is missing.
//! Opened cameras are owned by the [`CameraRegistry`], which guarantees that
//! each of them is closed exactly once.

use std::fmt;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::Serialize;

use super::{CameraError, CameraPort};

/// Opens one camera; run once during discovery
pub type CameraFactory = Box<dyn FnOnce() -> Result<Arc<dyn CameraPort>, CameraError> + Send>;

/// A named camera probe
pub struct ProbeCandidate {
    pub id: String,
    factory: CameraFactory,
}

impl ProbeCandidate {
    pub fn new<F>(id: impl Into<String>, factory: F) -> Self
    where
        F: FnOnce() -> Result<Arc<dyn CameraPort>, CameraError> + Send + 'static,
    {
        Self {
            id: id.into(),
            factory: Box::new(factory),
        }
    }
}

/// Result of one probe
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Detected,
    NotFound(String),
    DriverError(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub id: String,
    #[serde(flatten)]
    pub outcome: ProbeOutcome,
}

/// Outcome of every probe, in probe order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveryReport {
    pub results: Vec<ProbeResult>,
}

impl DiscoveryReport {
    pub fn detected(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|result| result.outcome == ProbeOutcome::Detected)
            .map(|result| result.id.as_str())
    }
}

impl fmt::Display for DiscoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for result in &self.results {
            match &result.outcome {
                ProbeOutcome::Detected => writeln!(f, "{:<16} detected", result.id)?,
                ProbeOutcome::NotFound(reason) => {
                    writeln!(f, "{:<16} not found ({})", result.id, reason)?
                }
                ProbeOutcome::DriverError(reason) => {
                    writeln!(f, "{:<16} driver error ({})", result.id, reason)?
                }
            }
        }
        Ok(())
    }
}

/// Ordered set of opened cameras, keyed by id
#[derive(Default)]
pub struct CameraRegistry {
    cameras: Vec<(String, Arc<dyn CameraPort>)>,
    closed: bool,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a camera under `id`.
    ///
    /// Returns `false` (and leaves the registry untouched) when the id is
    /// already taken or the registry has been closed.
    pub fn register(&mut self, id: impl Into<String>, camera: Arc<dyn CameraPort>) -> bool {
        let id = id.into();
        if self.closed {
            warn!("Camera registry is closed, ignoring '{}'", id);
            return false;
        }
        if self.get(&id).is_some() {
            warn!("Camera id '{}' is already registered", id);
            return false;
        }
        self.cameras.push((id, camera));
        true
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn CameraPort>> {
        self.cameras
            .iter()
            .find(|(camera_id, _)| camera_id == id)
            .map(|(_, camera)| camera.clone())
    }

    /// Registered cameras in registration order
    pub fn cameras(&self) -> impl Iterator<Item = (&str, &Arc<dyn CameraPort>)> {
        self.cameras
            .iter()
            .map(|(id, camera)| (id.as_str(), camera))
    }

    pub fn ids(&self) -> Vec<String> {
        self.cameras.iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close every registered camera. Only the first call has any effect.
    ///
    /// Close failures are logged and returned; they do not prevent the
    /// remaining cameras from being closed.
    pub fn close_all(&mut self) -> Vec<(String, CameraError)> {
        if self.closed {
            return Vec::new();
        }
        self.closed = true;
        let mut failures = Vec::new();
        for (id, camera) in &self.cameras {
            debug!("Closing camera '{}'", id);
            if let Err(err) = camera.close() {
                warn!("Failed to close camera '{}': {}", id, err);
                failures.push((id.clone(), err));
            }
        }
        failures
    }
}

/// Probe every candidate and register the cameras that open.
///
/// ### Parameters
///
/// * `candidates` - Named probes, run in order
/// * `registry` - Receives the detected cameras
///
/// ### Returns
///
/// The outcome of each probe. A factory failing with
/// [`CameraError::NotFound`] is reported as `NotFound`; any other failure
/// (including a duplicate id) as `DriverError`.
pub fn discover(candidates: Vec<ProbeCandidate>, registry: &mut CameraRegistry) -> DiscoveryReport {
    let mut report = DiscoveryReport::default();
    for candidate in candidates {
        let ProbeCandidate { id, factory } = candidate;
        let outcome = match factory() {
            Ok(camera) => {
                if registry.register(id.clone(), camera.clone()) {
                    info!("Detected camera '{}': {}", id, camera.descriptor().name);
                    ProbeOutcome::Detected
                } else {
                    if let Err(err) = camera.close() {
                        warn!("Failed to release rejected camera '{}': {}", id, err);
                    }
                    ProbeOutcome::DriverError("duplicate camera id".to_string())
                }
            }
            Err(CameraError::NotFound(reason)) => {
                debug!("Camera '{}' not found: {}", id, reason);
                ProbeOutcome::NotFound(reason)
            }
            Err(err) => {
                warn!("Camera '{}' failed to open: {}", id, err);
                ProbeOutcome::DriverError(err.to_string())
            }
        };
        report.results.push(ProbeResult { id, outcome });
    }
    report
}
