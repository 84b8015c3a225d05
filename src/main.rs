// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the FT-Raman acquisition daemon
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use tokio::signal;

use rust_ftraman::acquisition::{
    AcquisitionState, ControlHandle, Fault, ProcessedTrace, SharedSpectrumStream,
    SpectrumStreamConsumer, StreamStats,
};
use rust_ftraman::camera::{discover, CameraRegistry};
use rust_ftraman::config::{self, Config};
use rust_ftraman::daemon::Daemon;

/// Continuous acquisition and spectral processing for FT-Raman spectrometers
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Probe the configured cameras, print the result and exit
    #[arg(long = "list-cameras", default_value_t = false)]
    list_cameras: bool,

    /// Camera to acquire from (default: first detected)
    #[arg(long)]
    camera: Option<String>,

    /// Number of traces in the rolling average
    #[arg(long)]
    accumulation: Option<usize>,

    /// Exposure time in ms
    #[arg(long)]
    exposure: Option<f64>,

    /// Excitation (center) wavelength in nm
    #[arg(long)]
    center: Option<f64>,

    /// Filter cutoff wavelength in nm
    #[arg(long)]
    cutoff: Option<f64>,

    /// Stop after this many seconds (default: run until Ctrl+C)
    #[arg(long)]
    duration: Option<f64>,

    /// Write the last spectrum to this file (JSON)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if args.show_config_schema {
        return config::output_config_schema();
    }

    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }

        Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let mut config = Config::from_file(&config_path)?;

    config.apply_args(args.accumulation, args.exposure, args.center, args.cutoff);
    config::validate_specific_rules(&config).context("Invalid command line override")?;

    if args.list_cameras {
        let mut registry = CameraRegistry::new();
        let report = discover(
            config
                .cameras
                .simulated_candidates(config.axis.cutoff_wavelength_nm),
            &mut registry,
        );
        print!("{}", report);
        registry.close_all();
        return Ok(());
    }

    let stream = SharedSpectrumStream::default();
    let mut consumer = SpectrumStreamConsumer::new(&stream);
    let mut daemon = Daemon::launch(&config, Arc::new(stream.clone()))?;
    let control = daemon.control();

    let started = start_acquisition(&control, args.camera.as_deref());
    let run = match started {
        Ok(()) => {
            let duration = args.duration.map(Duration::from_secs_f64);
            consume(&mut consumer, &control, duration).await
        }
        Err(err) => Err(err),
    };

    let latest = consumer.latest();
    let shutdown = daemon.shutdown();

    if let (Some(path), Some(trace)) = (&args.output, latest) {
        let export = trace.to_spectrum_export();
        std::fs::write(path, serde_json::to_string_pretty(&export)?)
            .with_context(|| format!("Failed to write spectrum to {}", path.display()))?;
        info!("Spectrum #{} saved to {}", trace.sequence, path.display());
    }

    run?;
    shutdown
}

fn start_acquisition(control: &ControlHandle, camera: Option<&str>) -> Result<()> {
    let camera_id = match camera {
        Some(id) => id.to_string(),
        None => control
            .camera_ids()
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No camera detected"))?,
    };
    control.select_camera(&camera_id)?;
    control.resume()?;
    info!("Acquisition started on '{}'", camera_id);
    Ok(())
}

/// Follow the stream until Ctrl+C, the requested duration, or a stop
async fn consume(
    consumer: &mut SpectrumStreamConsumer,
    control: &ControlHandle,
    duration: Option<Duration>,
) -> Result<()> {
    let deadline = async {
        match duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut last: Option<Arc<ProcessedTrace>> = None;
    let mut reported_fault: Option<Fault> = None;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received shutdown signal, stopping acquisition");
                return Ok(());
            }
            _ = &mut deadline => {
                info!("Acquisition duration elapsed");
                return Ok(());
            }
            trace = consumer.next_trace() => match trace {
                Some(trace) => last = Some(trace),
                None => return Ok(()),
            },
            _ = ticker.tick() => {
                match control.state() {
                    AcquisitionState::Stopped(reason) => {
                        return Err(anyhow::anyhow!("Acquisition stopped: {:?}", reason));
                    }
                    AcquisitionState::Paused => {
                        let fault = control.last_fault();
                        if fault != reported_fault {
                            if let Some(fault) = &fault {
                                warn!(
                                    "Acquisition paused after {} failures of '{}': {}",
                                    fault.consecutive_failures, fault.camera_id, fault.error
                                );
                            }
                            reported_fault = fault;
                        }
                    }
                    _ => {}
                }
                if let Some(trace) = &last {
                    report(trace, &consumer.stats());
                }
            }
        }
    }
}

fn report(trace: &ProcessedTrace, stats: &StreamStats) {
    let peak = trace
        .spectrum
        .magnitudes
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1));
    match peak {
        Some((index, magnitude)) => info!(
            "#{} {:.1} fps, peak {:.4} at {:.2} nm ({:.1} cm-1)",
            trace.sequence,
            stats.fps,
            magnitude,
            trace.axes.wavelength_nm.get(index).copied().unwrap_or(f64::NAN),
            trace.axes.raman_shift_cm1.get(index).copied().unwrap_or(f64::NAN),
        ),
        None => info!("#{} {:.1} fps, empty window", trace.sequence, stats.fps),
    }
}
