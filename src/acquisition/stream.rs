// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-ftraman project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Result streaming module
//!
//! The acquisition worker hands every processed trace to a [`ResultSink`].
//! [`SharedSpectrumStream`] is the default sink: it fans the traces out to any
//! number of async consumers through a broadcast channel, keeps the latest
//! trace for late subscribers and maintains throughput statistics.
//!
//! Publishing never blocks: with no subscriber the trace is only kept as the
//! latest value, and slow subscribers skip the traces they lagged behind on.

use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::axis::{auto_scale, PresentationAxes};
use crate::spectral::SpectralFrame;

/// Output of one acquisition cycle
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedTrace {
    /// Monotonic counter of published traces
    pub sequence: u64,
    pub camera_id: String,
    pub timestamp: DateTime<Utc>,
    /// Averaged raw trace
    pub raw: Vec<f64>,
    pub spectrum: SpectralFrame,
    /// Axes shared by every trace of the same snapshot
    #[serde(skip)]
    pub axes: Arc<PresentationAxes>,
}

/// Raw 2-D readout of an area sensor
#[derive(Debug, Clone)]
pub struct ImageFrame {
    pub sequence: u64,
    pub camera_id: String,
    pub timestamp: DateTime<Utc>,
    pub image: Array2<f64>,
}

/// One point of an exported spectrum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumPoint {
    pub wavelength_nm: f64,
    pub raman_shift_cm1: f64,
    pub magnitude: f64,
}

/// Spectrum with its axes, ordered by ascending wavelength
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumExport {
    pub camera_id: String,
    pub timestamp: DateTime<Utc>,
    pub sequence: u64,
    /// Suggested vertical plot range of the magnitudes
    pub display_range: (f64, f64),
    pub points: Vec<SpectrumPoint>,
}

impl ProcessedTrace {
    /// Plot range of the raw trace, whose samples lie in `[0, 1]`
    pub fn raw_display_range(&self) -> (f64, f64) {
        auto_scale(&self.raw, 1e-3, Some(1.0))
    }

    pub fn spectrum_display_range(&self) -> (f64, f64) {
        auto_scale(&self.spectrum.magnitudes, 1e-4, None)
    }

    /// Pair each magnitude with its wavelength and Raman shift.
    ///
    /// Spectral bins run from long to short wavelengths; the export reverses
    /// them so wavelengths increase.
    pub fn to_spectrum_export(&self) -> SpectrumExport {
        let mut points: Vec<SpectrumPoint> = self
            .axes
            .wavelength_nm
            .iter()
            .zip(&self.axes.raman_shift_cm1)
            .zip(&self.spectrum.magnitudes)
            .map(|((&wavelength_nm, &raman_shift_cm1), &magnitude)| SpectrumPoint {
                wavelength_nm,
                raman_shift_cm1,
                magnitude,
            })
            .collect();
        points.sort_by(|a, b| a.wavelength_nm.total_cmp(&b.wavelength_nm));
        SpectrumExport {
            camera_id: self.camera_id.clone(),
            timestamp: self.timestamp,
            sequence: self.sequence,
            display_range: self.spectrum_display_range(),
            points,
        }
    }
}

/// Consumer of processed traces.
///
/// Called from the acquisition worker thread, so implementations must return
/// quickly and never block on the consumer side.
pub trait ResultSink: Send + Sync {
    fn consume(&self, trace: &ProcessedTrace);

    /// Raw image of an area sensor, published before the matching trace
    fn consume_image(&self, image: &ImageFrame) {
        let _ = image;
    }
}

/// Statistics about the stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamStats {
    pub total_traces: u64,
    pub total_images: u64,
    pub active_subscribers: usize,
    /// Traces per second, refreshed about once a second
    pub fps: f64,
    /// Time of the last fps refresh, ms since the Unix epoch
    pub last_update: u64,
    pub traces_since_last_update: u64,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl Default for StreamStats {
    fn default() -> Self {
        Self {
            total_traces: 0,
            total_images: 0,
            active_subscribers: 0,
            fps: 0.0,
            last_update: now_ms(),
            traces_since_last_update: 0,
        }
    }
}

/// Broadcast fan-out of processed traces
#[derive(Clone, Debug)]
pub struct SharedSpectrumStream {
    traces: broadcast::Sender<Arc<ProcessedTrace>>,
    images: broadcast::Sender<Arc<ImageFrame>>,
    latest: Arc<RwLock<Option<Arc<ProcessedTrace>>>>,
    stats: Arc<RwLock<StreamStats>>,
}

impl SharedSpectrumStream {
    /// Create a stream whose subscribers may lag `buffer_size` traces behind
    pub fn new(buffer_size: usize) -> Self {
        let (traces, _) = broadcast::channel(buffer_size.max(1));
        let (images, _) = broadcast::channel(buffer_size.max(1));
        Self {
            traces,
            images,
            latest: Arc::new(RwLock::new(None)),
            stats: Arc::new(RwLock::new(StreamStats::default())),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ProcessedTrace>> {
        self.traces.subscribe()
    }

    pub fn subscribe_images(&self) -> broadcast::Receiver<Arc<ImageFrame>> {
        self.images.subscribe()
    }

    /// Publish a trace to every subscriber
    pub fn publish(&self, trace: ProcessedTrace) {
        let trace = Arc::new(trace);
        *self
            .latest
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(trace.clone());

        {
            let mut stats = self
                .stats
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            stats.total_traces += 1;
            stats.traces_since_last_update += 1;
            stats.active_subscribers = self.traces.receiver_count();

            let now = now_ms();
            let elapsed = now.saturating_sub(stats.last_update);
            if elapsed >= 1000 {
                stats.fps = stats.traces_since_last_update as f64 / (elapsed as f64 / 1000.0);
                stats.last_update = now;
                stats.traces_since_last_update = 0;
            }
        }

        // No receivers is not an error
        let _ = self.traces.send(trace);
    }

    pub fn publish_image(&self, image: ImageFrame) {
        self.stats
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .total_images += 1;
        let _ = self.images.send(Arc::new(image));
    }

    pub fn latest(&self) -> Option<Arc<ProcessedTrace>> {
        self.latest
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.traces.receiver_count()
    }
}

impl Default for SharedSpectrumStream {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ResultSink for SharedSpectrumStream {
    fn consume(&self, trace: &ProcessedTrace) {
        self.publish(trace.clone());
    }

    fn consume_image(&self, image: &ImageFrame) {
        self.publish_image(image.clone());
    }
}

/// Subscriber handle on a [`SharedSpectrumStream`]
pub struct SpectrumStreamConsumer {
    receiver: broadcast::Receiver<Arc<ProcessedTrace>>,
    stream: SharedSpectrumStream,
}

impl SpectrumStreamConsumer {
    pub fn new(stream: &SharedSpectrumStream) -> Self {
        Self {
            receiver: stream.subscribe(),
            stream: stream.clone(),
        }
    }

    /// Wait for the next trace; `None` once the stream is gone
    pub async fn next_trace(&mut self) -> Option<Arc<ProcessedTrace>> {
        loop {
            match self.receiver.recv().await {
                Ok(trace) => return Some(trace),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log::warn!(
                        "Spectrum consumer lagged behind, skipped {} traces",
                        skipped
                    );
                }
            }
        }
    }

    /// Next pending trace without waiting
    pub fn try_next(&mut self) -> Option<Arc<ProcessedTrace>> {
        loop {
            match self.receiver.try_recv() {
                Ok(trace) => return Some(trace),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    log::warn!(
                        "Spectrum consumer lagged behind, skipped {} traces",
                        skipped
                    );
                }
                Err(_) => return None,
            }
        }
    }

    pub fn latest(&self) -> Option<Arc<ProcessedTrace>> {
        self.stream.latest()
    }

    pub fn stats(&self) -> StreamStats {
        self.stream.stats()
    }
}
