// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use std::collections::HashSet;

use anyhow::{Context, Result};
use log::debug;

use super::Config;

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./rust_ftraman --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema_str = include_str!("../../resources/config.schema.json");

    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// * accumulation depth of at least one trace
/// * `0 < λmin < λ0`
/// * zero-pad factor of at least 2
/// * simulated cameras with unique ids and at least two pixels
/// * a frequency window `0 ≤ min < max ≤ zero_pad_factor · width` that
///   resolves to a non-empty range for every simulated camera
///
/// # Arguments
///
/// * `config` - The configuration object to validate
///
/// # Returns
///
/// * `Ok(())` if all validations pass
/// * `Err(anyhow::Error)` with descriptive message if any validation fails
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Validating configuration specific rules");

    if config.acquisition.accumulation_depth == 0 {
        anyhow::bail!("Accumulation depth must be at least 1");
    }
    if config.acquisition.max_consecutive_failures == 0 {
        anyhow::bail!("max_consecutive_failures must be at least 1");
    }

    config.axis.validate().map_err(anyhow::Error::msg)?;

    if config.spectral.zero_pad_factor < 2 {
        anyhow::bail!(
            "Zero-pad factor must be at least 2, got {}",
            config.spectral.zero_pad_factor
        );
    }
    if let Some(max) = config.spectral.max_frequency_index {
        if config.spectral.min_frequency_index >= max {
            anyhow::bail!(
                "min_frequency_index ({}) must be below max_frequency_index ({})",
                config.spectral.min_frequency_index,
                max
            );
        }
    }

    let mut ids = HashSet::new();
    for camera in &config.cameras.simulated {
        if !ids.insert(camera.id.as_str()) {
            anyhow::bail!("Duplicate camera id '{}'", camera.id);
        }
        if camera.pixel_count < 2 {
            anyhow::bail!(
                "Camera '{}' must have at least 2 pixels, got {}",
                camera.id,
                camera.pixel_count
            );
        }
        if !(camera.pixel_pitch_um > 0.0) {
            anyhow::bail!("Camera '{}' must have a positive pixel pitch", camera.id);
        }
        config
            .spectral
            .window(camera.pixel_count)
            .with_context(|| format!("Spectral window does not fit camera '{}'", camera.id))?;
    }

    Ok(())
}
