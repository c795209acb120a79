//! Background restoration with progress reporting and cancellation.
//!
//! The synchronous [`RestorationSession`](crate::session::RestorationSession)
//! is the reference behavior; this manager is the opt-in layer for callers
//! that cannot block an interactive surface. Starting a new restoration
//! cancels any in-flight one first, so a result computed from an older
//! parameter set is never observed after a newer request (last-request-wins).
//! Each restoration is a bounded pure computation, safe to abandon between
//! channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use ndarray::Array2;

use crate::deconvolution::richardson_lucy;
use crate::error::RestoreError;
use crate::float_trait::RestoreFloat;
use crate::pipeline::{
    clip_unit, RawImage, RestorationParameters, RestoredImage, CHANNEL_COUNT,
};
use crate::psf::{generate_psf, DEFAULT_PSF_SIGMA};

/// Progress update from the restoration thread.
#[derive(Debug, Clone)]
pub enum RestorationProgress<F: RestoreFloat> {
    /// Restoration started
    Started { total_channels: usize },
    /// Channel deconvolved
    ChannelComplete {
        channel: usize,
        total_channels: usize,
    },
    /// Restoration finished successfully
    Finished { result: RestoredImage<F> },
    /// Restoration was cancelled
    Cancelled,
    /// Error occurred
    Error(RestoreError),
}

/// Restoration state for the UI collaborator.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RestorationState {
    #[default]
    Idle,
    Processing {
        current_channel: usize,
        total_channels: usize,
    },
    Completed,
    Cancelled,
    Error(RestoreError),
}

/// Manager for background restoration requests.
pub struct RestorationManager<F: RestoreFloat> {
    /// Current restoration state
    state: RestorationState,
    /// Channel to receive progress updates
    progress_rx: Option<Receiver<RestorationProgress<F>>>,
    /// Cancel flag shared with the worker thread
    cancel_flag: Arc<AtomicBool>,
    /// Handle to the worker thread
    worker_handle: Option<JoinHandle<()>>,
    /// Restored result
    restored_result: Option<RestoredImage<F>>,
}

impl<F: RestoreFloat> Default for RestorationManager<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: RestoreFloat> RestorationManager<F> {
    pub fn new() -> Self {
        Self {
            state: RestorationState::Idle,
            progress_rx: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            worker_handle: None,
            restored_result: None,
        }
    }

    pub fn state(&self) -> &RestorationState {
        &self.state
    }

    pub fn is_processing(&self) -> bool {
        matches!(self.state, RestorationState::Processing { .. })
    }

    pub fn restored_result(&self) -> Option<&RestoredImage<F>> {
        self.restored_result.as_ref()
    }

    pub fn take_restored_result(&mut self) -> Option<RestoredImage<F>> {
        self.restored_result.take()
    }

    /// Start restoring `raw` with the given parameters.
    ///
    /// Any in-flight restoration is cancelled first; only the newest request
    /// can ever produce a visible result.
    pub fn start_restore(&mut self, raw: RawImage<F>, params: RestorationParameters<F>) {
        // Cancel any existing restoration
        self.cancel();

        // Reset state
        self.cancel_flag = Arc::new(AtomicBool::new(false));
        self.restored_result = None;

        // Create channel for progress updates
        let (tx, rx) = channel();
        self.progress_rx = Some(rx);

        // Clone cancel flag for worker
        let cancel_flag = self.cancel_flag.clone();

        // Spawn worker thread
        let handle = thread::spawn(move || {
            restore_image_worker(raw, params, tx, cancel_flag);
        });

        self.worker_handle = Some(handle);
        self.state = RestorationState::Processing {
            current_channel: 0,
            total_channels: CHANNEL_COUNT,
        };
    }

    /// Request cancellation of the current restoration.
    pub fn cancel(&mut self) {
        self.cancel_flag.store(true, Ordering::SeqCst);

        // Wait for worker to finish
        if let Some(handle) = self.worker_handle.take() {
            let _ = handle.join();
        }

        self.progress_rx = None;
    }

    /// Poll for progress updates. Call this each frame.
    pub fn poll_progress(&mut self) {
        // Collect all pending messages first
        let mut messages = Vec::new();
        if let Some(rx) = &self.progress_rx {
            while let Ok(progress) = rx.try_recv() {
                messages.push(progress);
            }
        }

        // Track if we need to clean up
        let mut should_cleanup = false;

        // Process collected messages
        for progress in messages {
            match progress {
                RestorationProgress::Started { total_channels } => {
                    self.state = RestorationState::Processing {
                        current_channel: 0,
                        total_channels,
                    };
                }
                RestorationProgress::ChannelComplete {
                    channel,
                    total_channels,
                } => {
                    self.state = RestorationState::Processing {
                        current_channel: channel + 1,
                        total_channels,
                    };
                }
                RestorationProgress::Finished { result } => {
                    self.restored_result = Some(result);
                    self.state = RestorationState::Completed;
                    should_cleanup = true;
                }
                RestorationProgress::Cancelled => {
                    self.state = RestorationState::Cancelled;
                    should_cleanup = true;
                }
                RestorationProgress::Error(err) => {
                    self.state = RestorationState::Error(err);
                    should_cleanup = true;
                }
            }
        }

        // Clean up after processing all messages
        if should_cleanup {
            self.progress_rx = None;
            self.worker_handle = None;
        }
    }

    /// Reset state to idle.
    pub fn reset(&mut self) {
        self.cancel();
        self.state = RestorationState::Idle;
        self.restored_result = None;
    }
}

/// Worker function that runs in the background thread.
/// Deconvolves the three planes one by one so cancellation and progress have
/// per-channel granularity.
fn restore_image_worker<F: RestoreFloat>(
    raw: RawImage<F>,
    params: RestorationParameters<F>,
    tx: Sender<RestorationProgress<F>>,
    cancel_flag: Arc<AtomicBool>,
) {
    if tx
        .send(RestorationProgress::Started {
            total_channels: CHANNEL_COUNT,
        })
        .is_err()
    {
        return;
    }

    let params = params.clamped();
    let psf = match generate_psf(params.psf_size(), F::from_f64_c(DEFAULT_PSF_SIGMA)) {
        Ok(psf) => psf,
        Err(err) => {
            let _ = tx.send(RestorationProgress::Error(err));
            return;
        }
    };

    let dim = raw.dim();
    let mut planes = [
        Array2::zeros(dim),
        Array2::zeros(dim),
        Array2::zeros(dim),
    ];

    for channel in 0..CHANNEL_COUNT {
        // Check for cancellation
        if cancel_flag.load(Ordering::SeqCst) {
            let _ = tx.send(RestorationProgress::Cancelled);
            return;
        }

        let result = richardson_lucy(
            raw.planes()[channel].view(),
            psf.view(),
            params.iterations,
        );

        match result {
            Ok(estimate) => {
                planes[channel] = clip_unit(estimate);
            }
            Err(source) => {
                // A failed channel fails the whole request; the output never
                // carries fewer than three planes.
                let _ = tx.send(RestorationProgress::Error(
                    RestoreError::ChannelRestoration {
                        channel,
                        source: Box::new(source),
                    },
                ));
                return;
            }
        }

        if tx
            .send(RestorationProgress::ChannelComplete {
                channel,
                total_channels: CHANNEL_COUNT,
            })
            .is_err()
        {
            return;
        }
    }

    let _ = tx.send(RestorationProgress::Finished {
        result: RestoredImage::from_planes(planes),
    });
}

// =============================================================================
// Tests
// =============================================================================
