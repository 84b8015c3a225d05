// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the acquisition engine
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema before being deserialized, then checked
//! against the semantic rules the schema cannot express.
//!
//! ## Configuration Structure
//!
//! - `acquisition`: accumulation depth, polling, high-pass filter, failure policy
//! - `spectral`: zero-pad factor, published frequency window, normalization
//! - `axis`: cutoff and excitation wavelengths
//! - `cameras`: initial exposure and gain, simulated cameras
//!
//! ## Usage
//!
//! ```no_run
//! use rust_ftraman::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some(16),    // Accumulation depth
//!     Some(20.0),  // Exposure (ms)
//!     Some(785.0), // Center wavelength (nm)
//!     Some(750.0), // Cutoff wavelength (nm)
//! );
//!
//! println!("Averaging {} traces", config.acquisition.accumulation_depth);
//! ```

pub mod acquisition;
pub mod axis;
pub mod camera;
pub mod spectral;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use acquisition::{AcquisitionConfig, FailureAction, HighpassConfig};
pub use axis::AxisConfig;
pub use camera::{CameraConfig, SimulatedCameraConfig, SimulatedSignalConfig};
pub use spectral::SpectralConfig;
pub use utils::{output_config_schema, validate_specific_rules};

/// Root configuration structure.
///
/// Every section falls back to its defaults when missing from the file, so a
/// minimal configuration only lists what differs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Acquisition worker settings
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Magnitude spectrum settings
    #[serde(default)]
    pub spectral: SpectralConfig,

    /// Wavelengths of the presentation axes
    #[serde(default)]
    pub axis: AxisConfig,

    /// Camera defaults and simulated cameras
    #[serde(default)]
    pub cameras: CameraConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Creating sample configuration file at {:?}", sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file.
    ///
    /// A missing file is created with the defaults. Otherwise the YAML is
    /// validated against the embedded JSON schema, deserialized and checked
    /// with [`validate_specific_rules`]. Any failure writes a
    /// `<name>.sample.yaml` next to the file and returns the error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })?;

        let schema_str = include_str!("../../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only the values that are provided override the loaded configuration.
    ///
    /// # Parameters
    ///
    /// * `accumulation` - Number of traces in the rolling average
    /// * `exposure_ms` - Exposure applied when a camera is selected
    /// * `center_wavelength_nm` - Excitation wavelength `λ0`
    /// * `cutoff_wavelength_nm` - Filter cutoff wavelength `λmin`
    pub fn apply_args(
        &mut self,
        accumulation: Option<usize>,
        exposure_ms: Option<f64>,
        center_wavelength_nm: Option<f64>,
        cutoff_wavelength_nm: Option<f64>,
    ) {
        if let Some(depth) = accumulation {
            debug!("Overriding accumulation depth from command line: {}", depth);
            self.acquisition.accumulation_depth = depth;
        }
        if let Some(exposure) = exposure_ms {
            debug!("Overriding exposure from command line: {} ms", exposure);
            self.cameras.exposure_ms = exposure;
        }
        if let Some(center) = center_wavelength_nm {
            debug!("Overriding center wavelength from command line: {} nm", center);
            self.axis.center_wavelength_nm = center;
        }
        if let Some(cutoff) = cutoff_wavelength_nm {
            debug!("Overriding cutoff wavelength from command line: {} nm", cutoff);
            self.axis.cutoff_wavelength_nm = cutoff;
        }
    }

    /// Effective high-pass cutoff bin
    pub fn highpass_cutoff_bin(&self) -> usize {
        self.acquisition
            .highpass
            .cutoff_bin
            .unwrap_or(self.spectral.min_frequency_index)
    }
}
