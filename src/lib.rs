//! Image Restoration Core Library
//!
//! Pure Rust implementation of the restoration engine behind an interactive
//! image-adjustment tool: Gaussian point-spread-function generation and
//! Richardson-Lucy iterative deconvolution applied independently per color
//! channel, recomputed in full on every parameter change. UI construction,
//! file dialogs, rendering, and image decoding are the caller's concern.

pub mod deconvolution;
pub mod enhance;
pub mod error;
pub mod float_trait;
pub mod pipeline;
pub mod psf;
pub mod session;
pub mod worker;

// Re-export commonly used types at the crate root
pub use deconvolution::{convolve_2d, correlate_2d, richardson_lucy};
pub use error::{RestoreError, Result};
pub use float_trait::RestoreFloat;
pub use pipeline::{restore, RawImage, RestorationParameters, RestoredImage, CHANNEL_COUNT};
pub use psf::{flip_psf, generate_psf, psf_size_for_strength, DEFAULT_PSF_SIGMA};
pub use session::RestorationSession;
pub use worker::{RestorationManager, RestorationProgress, RestorationState};
