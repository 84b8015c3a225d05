// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Acquisition configuration
//!
//! Settings of the acquisition worker: accumulation depth, polling cadence,
//! optional high-pass pre-filtering, the policy applied when a camera keeps
//! failing, and the bounded join used at shutdown.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What the worker does once a camera has failed too many times in a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailureAction {
    /// Pause acquisition and record the fault
    #[default]
    Pause,
    /// Stop the worker
    Stop,
}

/// Optional FFT high-pass applied to each raw trace before accumulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct HighpassConfig {
    pub enabled: bool,
    /// Bins `[0, cutoff_bin)` are removed. Defaults to the spectral
    /// `min_frequency_index` when unset.
    pub cutoff_bin: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Number of traces in the rolling average
    pub accumulation_depth: usize,

    /// Upper bound on the worker's sleep while paused, in ms
    pub poll_interval_ms: u64,

    pub highpass: HighpassConfig,

    /// Consecutive frame failures tolerated before `on_repeated_failure`
    pub max_consecutive_failures: u32,

    pub on_repeated_failure: FailureAction,

    /// Time allowed for the worker to exit on each join attempt, in ms
    pub join_timeout_ms: u64,

    /// Join attempts before shutdown gives up and reports the worker as busy
    pub join_attempts: u32,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            accumulation_depth: 1,
            poll_interval_ms: 10,
            highpass: HighpassConfig::default(),
            max_consecutive_failures: 5,
            on_repeated_failure: FailureAction::Pause,
            join_timeout_ms: 100,
            join_attempts: 50,
        }
    }
}

impl AcquisitionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}
