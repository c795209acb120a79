//! Error taxonomy for the restoration core.
//!
//! Every failure is terminal for the current restoration request and is
//! returned to the caller as a structured value. The core never retries and
//! never emits free-form diagnostics on its own.

use thiserror::Error;

/// Restoration error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RestoreError {
    /// PSF size parameter has no meaningful kernel.
    #[error("invalid PSF size {size}: kernel size must be at least 1")]
    InvalidParameter { size: usize },

    /// PSF does not fit the channel it should deconvolve.
    #[error("PSF kernel {psf}x{psf} is larger than the {rows}x{cols} channel")]
    KernelSize {
        psf: usize,
        rows: usize,
        cols: usize,
    },

    /// A single channel failed to deconvolve. The whole restoration call
    /// fails; the output never carries fewer than three planes.
    #[error("channel {channel} failed to restore: {source}")]
    ChannelRestoration {
        channel: usize,
        #[source]
        source: Box<RestoreError>,
    },

    /// Parameter change requested while no image is loaded.
    #[error("no image loaded")]
    NoImageLoaded,

    /// Color planes supplied with unequal dimensions.
    #[error("channel plane {channel} has shape {got:?}, expected {expected:?}")]
    PlaneShapeMismatch {
        channel: usize,
        expected: (usize, usize),
        got: (usize, usize),
    },
}

pub type Result<T> = std::result::Result<T, RestoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_error_carries_cause() {
        let cause = RestoreError::KernelSize {
            psf: 5,
            rows: 1,
            cols: 1,
        };
        let err = RestoreError::ChannelRestoration {
            channel: 2,
            source: Box::new(cause.clone()),
        };

        let msg = err.to_string();
        assert!(msg.contains("channel 2"));
        assert!(msg.contains("5x5"));

        match err {
            RestoreError::ChannelRestoration { channel, source } => {
                assert_eq!(channel, 2);
                assert_eq!(*source, cause);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
