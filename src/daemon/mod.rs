// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! The daemon owns the acquisition worker thread and everything whose
//! lifetime is tied to it: camera discovery at launch, the repeated-failure
//! policy, and the shutdown ordering (stop the worker, wait for it, then close
//! the cameras once).
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use rust_ftraman::{config::Config, daemon::Daemon, SharedSpectrumStream};
//!
//! fn run() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!     let stream = SharedSpectrumStream::default();
//!
//!     let mut daemon = Daemon::launch(&config, Arc::new(stream.clone()))?;
//!     let control = daemon.control();
//!     control.select_camera("2048x14um")?;
//!     control.resume()?;
//!
//!     // ... consume traces from `stream` ...
//!
//!     daemon.shutdown()?;
//!     Ok(())
//! }
//! ```

use std::any::Any;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use log::{debug, error, info, warn};

use crate::acquisition::{
    AcquisitionController, AcquisitionState, ControlHandle, Cycle, Fault, FrameError, ResultSink,
};
use crate::camera::{discover, CameraRegistry, DiscoveryReport, ProbeCandidate};
use crate::config::{Config, FailureAction};

/// Owner of the acquisition worker thread
pub struct Daemon {
    control: ControlHandle,
    discovery: DiscoveryReport,
    worker: Option<JoinHandle<u64>>,
    done: Receiver<()>,
    join_timeout: Duration,
    join_attempts: u32,
}

impl Daemon {
    /// Discover the configured cameras and start the worker.
    ///
    /// The worker starts Idle; select a camera and resume through
    /// [`Daemon::control`] to begin acquiring.
    pub fn launch(config: &Config, sink: Arc<dyn ResultSink>) -> Result<Self> {
        let candidates = config
            .cameras
            .simulated_candidates(config.axis.cutoff_wavelength_nm);
        Self::launch_with_candidates(config, candidates, sink)
    }

    /// Start the worker with an explicit list of camera probes
    pub fn launch_with_candidates(
        config: &Config,
        candidates: Vec<ProbeCandidate>,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self> {
        let mut registry = CameraRegistry::new();
        let discovery = discover(candidates, &mut registry);
        info!(
            "Discovered {} camera(s): {}",
            registry.len(),
            registry.ids().join(", ")
        );

        let (controller, control) = AcquisitionController::new(config, registry, sink);
        let (done_tx, done) = mpsc::channel();
        let policy = FailurePolicy {
            max_consecutive_failures: config.acquisition.max_consecutive_failures.max(1),
            action: config.acquisition.on_repeated_failure,
            retry_delay: config.acquisition.poll_interval(),
        };
        let worker_control = control.clone();

        let worker = thread::Builder::new()
            .name("acquisition".to_string())
            .spawn(move || {
                let published = run_worker(controller, worker_control, policy);
                // The receiver may already be gone when the daemon was dropped
                let _ = done_tx.send(());
                published
            })
            .context("Failed to spawn the acquisition thread")?;

        Ok(Self {
            control,
            discovery,
            worker: Some(worker),
            done,
            join_timeout: config.acquisition.join_timeout(),
            join_attempts: config.acquisition.join_attempts.max(1),
        })
    }

    /// Control surface of the worker
    pub fn control(&self) -> ControlHandle {
        self.control.clone()
    }

    /// Outcome of every camera probe run at launch
    pub fn discovery(&self) -> &DiscoveryReport {
        &self.discovery
    }

    pub fn state(&self) -> AcquisitionState {
        self.control.state()
    }

    /// Whether the worker thread is still owned by the daemon
    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Stop the worker and release the cameras.
    ///
    /// Waits for the worker at most `join_attempts × join_timeout`. If it is
    /// still inside a frame read after that, an error is returned, the cameras
    /// are left open and `shutdown` may be called again later. Once the
    /// worker has exited every camera is closed exactly once; later calls
    /// return `Ok(())` immediately.
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };

        info!("Shutting down acquisition");
        self.control.request_stop();

        let mut exited = false;
        for attempt in 1..=self.join_attempts {
            match self.done.recv_timeout(self.join_timeout) {
                // A disconnected channel means the worker unwound without signalling
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    exited = true;
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {
                    debug!(
                        "Acquisition worker still busy (attempt {}/{})",
                        attempt, self.join_attempts
                    );
                }
            }
        }

        if !exited {
            self.worker = Some(worker);
            warn!("Acquisition worker did not exit, cameras left open");
            anyhow::bail!(
                "Acquisition worker did not exit within {} × {:?}",
                self.join_attempts,
                self.join_timeout
            );
        }

        let joined = worker.join();
        for (id, err) in self.control.close_cameras() {
            warn!("Failed to close camera '{}': {}", id, err);
        }

        match joined {
            Ok(published) => {
                info!("Acquisition stopped after {} traces", published);
                Ok(())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Acquisition worker panicked: {}", message);
                Err(anyhow::anyhow!("Acquisition worker panicked: {}", message))
            }
        }
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.control.request_stop();
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FailurePolicy {
    max_consecutive_failures: u32,
    action: FailureAction,
    retry_delay: Duration,
}

/// Worker thread body. Returns the number of published traces.
fn run_worker(
    mut controller: AcquisitionController,
    control: ControlHandle,
    policy: FailurePolicy,
) -> u64 {
    debug!("Acquisition worker started");
    let mut failing_camera: Option<String> = None;
    let mut failures: u32 = 0;

    loop {
        match controller.cycle() {
            Ok(Cycle::Exit) => break,
            Ok(Cycle::Processed(_)) => failures = 0,
            Ok(Cycle::Waiting) | Ok(Cycle::Discarded) | Ok(Cycle::Dropped) => {}
            Err(FrameError { camera_id, error }) => {
                if failing_camera.as_deref() != Some(camera_id.as_str()) {
                    failing_camera = Some(camera_id.clone());
                    failures = 0;
                }
                failures += 1;
                warn!(
                    "Frame read from '{}' failed ({}/{}): {}",
                    camera_id, failures, policy.max_consecutive_failures, error
                );

                if failures >= policy.max_consecutive_failures {
                    control.escalate(
                        Fault {
                            camera_id,
                            error,
                            consecutive_failures: failures,
                            timestamp: Utc::now(),
                        },
                        policy.action,
                    );
                    failures = 0;
                } else {
                    thread::sleep(policy.retry_delay);
                }
            }
        }
    }

    controller.finish();
    debug!("Acquisition worker exiting");
    controller.published()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquisition::SharedSpectrumStream;

    fn quick_config() -> Config {
        let mut config = Config::default();
        config.cameras.exposure_ms = 1.0;
        config.cameras.simulated.truncate(1);
        config.acquisition.join_timeout_ms = 200;
        config
    }

    #[test]
    fn test_launch_registers_simulated_cameras() {
        let config = quick_config();
        let mut daemon =
            Daemon::launch(&config, Arc::new(SharedSpectrumStream::default())).unwrap();
        assert_eq!(daemon.discovery().detected().count(), 1);
        assert_eq!(daemon.state(), AcquisitionState::Idle);
        daemon.shutdown().unwrap();
        assert!(!daemon.is_running());
        assert!(matches!(daemon.state(), AcquisitionState::Stopped(_)));
        // Second shutdown is a no-op
        daemon.shutdown().unwrap();
    }

    #[test]
    fn test_panic_message_payloads() {
        let text: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(text.as_ref()), "boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(owned.as_ref()), "bang");
        let other: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }
}
