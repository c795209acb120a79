//! Restoration pipeline: image data model and per-channel orchestration.
//!
//! The pipeline owns no state. Every call rebuilds the PSF from the current
//! parameters, deconvolves the three color planes independently, and clips the
//! reassembled result to [0, 1]. Identical inputs give bit-identical output.

use ndarray::Array2;

use crate::deconvolution::richardson_lucy;
use crate::error::{RestoreError, Result};
use crate::float_trait::RestoreFloat;
use crate::psf::{generate_psf, psf_size_for_strength, DEFAULT_PSF_SIGMA};

// =============================================================================
// Constants
// =============================================================================

/// Number of color planes in an image. The pipeline never produces fewer.
pub const CHANNEL_COUNT: usize = 3;

/// Default iteration count (the original UI's "Clarity" slider default).
const DEFAULT_ITERATIONS: usize = 15;

/// Iteration counts below this are coerced before reaching the deconvolver.
const MIN_ITERATIONS: usize = 1;

// =============================================================================
// Types
// =============================================================================

/// Immutable snapshot of a loaded image: three equally sized planes of
/// intensities normalized to [0, 1], row-major.
///
/// The session replaces the snapshot wholesale on a new load; nothing mutates
/// it in place.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage<F: RestoreFloat> {
    planes: [Array2<F>; CHANNEL_COUNT],
}

impl<F: RestoreFloat> RawImage<F> {
    /// Build an image from three color planes.
    ///
    /// # Errors
    ///
    /// `RestoreError::PlaneShapeMismatch` if the planes differ in shape.
    pub fn from_planes(planes: [Array2<F>; CHANNEL_COUNT]) -> Result<Self> {
        let expected = planes[0].dim();
        for (channel, plane) in planes.iter().enumerate().skip(1) {
            if plane.dim() != expected {
                return Err(RestoreError::PlaneShapeMismatch {
                    channel,
                    expected,
                    got: plane.dim(),
                });
            }
        }
        Ok(Self { planes })
    }

    /// (height, width) of every plane.
    pub fn dim(&self) -> (usize, usize) {
        self.planes[0].dim()
    }

    pub fn planes(&self) -> &[Array2<F>; CHANNEL_COUNT] {
        &self.planes
    }
}

/// Pipeline output: three clipped planes with the input's dimensions.
/// Ownership moves to the caller; the pipeline keeps no reference.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredImage<F: RestoreFloat> {
    planes: [Array2<F>; CHANNEL_COUNT],
}

impl<F: RestoreFloat> RestoredImage<F> {
    pub(crate) fn from_planes(planes: [Array2<F>; CHANNEL_COUNT]) -> Self {
        Self { planes }
    }

    /// (height, width) of every plane.
    pub fn dim(&self) -> (usize, usize) {
        self.planes[0].dim()
    }

    pub fn planes(&self) -> &[Array2<F>; CHANNEL_COUNT] {
        &self.planes
    }

    pub fn into_planes(self) -> [Array2<F>; CHANNEL_COUNT] {
        self.planes
    }
}

/// User-facing restoration parameters.
///
/// The UI exposes `blur_strength` in [0, 2] and `iterations` in [1, 50];
/// neither upper bound is enforced here. Lower bounds are coerced by
/// [`RestorationParameters::clamped`] before any use - out-of-range input
/// never reaches the deconvolver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RestorationParameters<F: RestoreFloat> {
    /// Blur strength; kernel size is `3 + floor(blur_strength)`. Default: 0.0
    pub blur_strength: F,
    /// Richardson-Lucy iteration count. Default: 15
    pub iterations: usize,
}

impl<F: RestoreFloat> Default for RestorationParameters<F> {
    fn default() -> Self {
        Self {
            blur_strength: F::zero(),
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl<F: RestoreFloat> RestorationParameters<F> {
    pub fn new(blur_strength: F, iterations: usize) -> Self {
        Self {
            blur_strength,
            iterations,
        }
    }

    /// Coerce out-of-range values: negative or non-finite blur strength
    /// becomes 0, iteration counts below 1 become 1.
    pub fn clamped(&self) -> Self {
        let blur_strength = if self.blur_strength.is_finite() && self.blur_strength > F::zero() {
            self.blur_strength
        } else {
            F::zero()
        };
        Self {
            blur_strength,
            iterations: self.iterations.max(MIN_ITERATIONS),
        }
    }

    /// PSF kernel size implied by the (coerced) blur strength.
    pub fn psf_size(&self) -> usize {
        psf_size_for_strength(self.blur_strength)
    }
}

// =============================================================================
// Pipeline
// =============================================================================

pub(crate) fn clip_unit<F: RestoreFloat>(mut plane: Array2<F>) -> Array2<F> {
    plane.mapv_inplace(|v| v.max(F::zero()).min(F::one()));
    plane
}

/// Restore an image by deconvolving its three planes independently.
///
/// Builds one Gaussian PSF of size `3 + floor(blur_strength)` shared by all
/// channels, runs Richardson-Lucy per channel with no cross-channel sharing,
/// then clips every element to [0, 1] on assembly.
///
/// Pure function of its inputs: calling it twice with the same image and
/// parameters yields bit-identical output.
///
/// # Errors
///
/// `RestoreError::ChannelRestoration` if any channel fails, carrying the
/// channel index and the underlying cause. A failed channel is never dropped
/// from the output.
pub fn restore<F: RestoreFloat>(
    raw: &RawImage<F>,
    params: &RestorationParameters<F>,
) -> Result<RestoredImage<F>> {
    let params = params.clamped();
    let psf = generate_psf(params.psf_size(), F::from_f64_c(DEFAULT_PSF_SIGMA))?;

    let run_channel = |channel: usize| -> Result<Array2<F>> {
        richardson_lucy(
            raw.planes[channel].view(),
            psf.view(),
            params.iterations,
        )
        .map_err(|source| RestoreError::ChannelRestoration {
            channel,
            source: Box::new(source),
        })
    };

    // Channels are independent scalar fields; deconvolve them in parallel.
    let ((red, green), blue) = rayon::join(
        || rayon::join(|| run_channel(0), || run_channel(1)),
        || run_channel(2),
    );

    let planes = [clip_unit(red?), clip_unit(green?), clip_unit(blue?)];
    Ok(RestoredImage { planes })
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Helper: Simple LCG for deterministic test data
    struct SimpleLcg {
        state: u64,
    }

    impl SimpleLcg {
        fn new(seed: u64) -> Self {
            Self { state: seed }
        }

        fn next_u64(&mut self) -> u64 {
            self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
            self.state
        }

        fn next_f32(&mut self) -> f32 {
            let u = self.next_u64();
            (u >> 40) as f32 / (1u64 << 24) as f32
        }
    }

    fn random_image(rows: usize, cols: usize, seed: u64) -> RawImage<f32> {
        let mut rng = SimpleLcg::new(seed);
        let mut plane = || Array2::from_shape_fn((rows, cols), |_| rng.next_f32());
        RawImage::from_planes([plane(), plane(), plane()]).unwrap()
    }

    #[test]
    fn test_mismatched_planes_rejected() {
        let err = RawImage::from_planes([
            Array2::<f32>::zeros((4, 4)),
            Array2::<f32>::zeros((4, 4)),
            Array2::<f32>::zeros((4, 5)),
        ])
        .unwrap_err();

        assert_eq!(
            err,
            RestoreError::PlaneShapeMismatch {
                channel: 2,
                expected: (4, 4),
                got: (4, 5),
            }
        );
    }

    #[test]
    fn test_default_parameters() {
        let params: RestorationParameters<f32> = RestorationParameters::default();
        assert_eq!(params.blur_strength, 0.0);
        assert_eq!(params.iterations, 15);
        assert_eq!(params.psf_size(), 3);
    }

    #[test]
    fn test_parameters_clamped() {
        let params = RestorationParameters::new(-3.0f32, 0).clamped();
        assert_eq!(params.blur_strength, 0.0);
        assert_eq!(params.iterations, 1);
        assert_eq!(params.psf_size(), 3);
    }

    #[test]
    fn test_restore_is_idempotent() {
        let raw = random_image(12, 10, 42);
        let params = RestorationParameters::new(1.0, 5);

        let first = restore(&raw, &params).unwrap();
        let second = restore(&raw, &params).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_restore_preserves_shape_and_channel_count() {
        let raw = random_image(9, 13, 7);

        for iterations in [1, 5, 20] {
            let params = RestorationParameters::new(0.5, iterations);
            let out = restore(&raw, &params).unwrap();
            assert_eq!(out.dim(), (9, 13));
            assert_eq!(out.planes().len(), CHANNEL_COUNT);
        }
    }

    #[test]
    fn test_restore_output_clipped_to_unit_range() {
        let raw = random_image(16, 16, 13);
        let params = RestorationParameters::new(2.0, 30);

        let out = restore(&raw, &params).unwrap();
        for plane in out.planes() {
            assert!(plane.iter().all(|&v| (0.0..=1.0).contains(&v)));
        }
    }

    #[test]
    fn test_restore_zero_iterations_coerced() {
        let raw = random_image(8, 8, 3);
        let zero = restore(&raw, &RestorationParameters::new(0.0, 0)).unwrap();
        let one = restore(&raw, &RestorationParameters::new(0.0, 1)).unwrap();
        assert_eq!(zero, one);
    }

    #[test]
    fn test_restore_fails_whole_call_when_psf_too_large() {
        // blur_strength 2 gives a 5x5 PSF against a 4x4 image.
        let raw = random_image(4, 4, 9);
        let params = RestorationParameters::new(2.0f32, 5);

        let err = restore(&raw, &params).unwrap_err();
        match err {
            RestoreError::ChannelRestoration { channel, source } => {
                assert_eq!(channel, 0);
                assert_eq!(
                    *source,
                    RestoreError::KernelSize {
                        psf: 5,
                        rows: 4,
                        cols: 4,
                    }
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_flat_image_is_fixed_point_of_restore() {
        // Uniform planes stay uniform: the clip stage then leaves 0.5 as-is.
        let raw = RawImage::from_planes([
            Array2::from_elem((6, 6), 0.5f64),
            Array2::from_elem((6, 6), 0.5f64),
            Array2::from_elem((6, 6), 0.5f64),
        ])
        .unwrap();

        let out = restore(&raw, &RestorationParameters::new(0.0, 10)).unwrap();
        for plane in out.planes() {
            for &v in plane.iter() {
                assert!((v - 0.5).abs() < 1e-9);
            }
        }
    }
}
