//! Point-spread function (PSF) generation.
//!
//! The blur model is an isotropic Gaussian: a 1D discrete Gaussian is sampled
//! at `size` points and the 2D kernel is its outer product with itself. The
//! resulting matrix is normalized so all entries sum to 1.0 - an unnormalized
//! kernel would bias image energy during deconvolution.

use ndarray::{Array1, Array2, ArrayView2};

use crate::error::{RestoreError, Result};
use crate::float_trait::RestoreFloat;

// =============================================================================
// Constants
// =============================================================================

/// Default standard deviation of the Gaussian blur model.
pub const DEFAULT_PSF_SIGMA: f64 = 2.0;

/// Smallest kernel produced by `psf_size_for_strength` (blur_strength = 0).
const MIN_PSF_SIZE: usize = 3;

// =============================================================================
// Kernel construction
// =============================================================================

/// Map the user-facing blur strength to a kernel size: `3 + floor(strength)`.
///
/// Negative or non-finite strengths are coerced to zero. The UI exposes
/// strengths in [0, 2] (kernels of 3-5), but larger values simply produce
/// proportionally larger kernels.
pub fn psf_size_for_strength<F: RestoreFloat>(blur_strength: F) -> usize {
    let strength = if blur_strength.is_finite() && blur_strength > F::zero() {
        blur_strength
    } else {
        F::zero()
    };
    MIN_PSF_SIZE + strength.floor().to_usize().unwrap_or(0)
}

/// Sample a normalized 1D discrete Gaussian of the given length.
///
/// Samples are centered on `(size - 1) / 2`; for even sizes the center falls
/// between the two middle taps, matching `cv2.getGaussianKernel`. A
/// non-positive sigma degenerates to a delta kernel so the sum-to-one
/// invariant still holds.
fn gaussian_kernel_1d<F: RestoreFloat>(size: usize, sigma: F) -> Array1<F> {
    let mut kernel = Array1::zeros(size);

    if sigma <= F::zero() {
        kernel[(size - 1) / 2] = F::one();
        return kernel;
    }

    let center = F::usize_as(size - 1) / F::from_f64_c(2.0);
    let two_sigma2 = F::from_f64_c(2.0) * sigma * sigma;

    let mut sum = F::zero();
    for (i, k) in kernel.iter_mut().enumerate() {
        let x = F::usize_as(i) - center;
        let val = (-(x * x) / two_sigma2).exp();
        *k = val;
        sum += val;
    }

    let inv_sum = F::one() / sum;
    kernel.mapv_inplace(|v| v * inv_sum);
    kernel
}

/// Build a normalized square Gaussian PSF of the given size.
///
/// The kernel is the outer product of a 1D Gaussian with itself (separable,
/// exact for an isotropic blur), renormalized so the matrix sums to 1.0.
///
/// Pure function with no shared state; safe to call concurrently.
///
/// # Errors
///
/// `RestoreError::InvalidParameter` if `size < 1`.
pub fn generate_psf<F: RestoreFloat>(size: usize, sigma: F) -> Result<Array2<F>> {
    if size < 1 {
        return Err(RestoreError::InvalidParameter { size });
    }

    let kernel_1d = gaussian_kernel_1d(size, sigma);
    let mut psf = Array2::zeros((size, size));
    for r in 0..size {
        for c in 0..size {
            psf[[r, c]] = kernel_1d[r] * kernel_1d[c];
        }
    }

    // The outer product of a normalized vector already sums to ~1; divide by
    // the actual sum to tighten accumulated rounding error.
    let sum: F = psf.iter().copied().sum();
    let inv_sum = F::one() / sum;
    psf.mapv_inplace(|v| v * inv_sum);

    Ok(psf)
}

/// Rotate a kernel by 180 degrees.
///
/// Correlating with the flipped kernel is equivalent to convolving with the
/// original; the Richardson-Lucy update needs both orientations.
pub fn flip_psf<F: RestoreFloat>(psf: ArrayView2<F>) -> Array2<F> {
    let (rows, cols) = psf.dim();
    Array2::from_shape_fn((rows, cols), |(r, c)| psf[[rows - 1 - r, cols - 1 - c]])
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn test_psf_sums_to_one() {
        for size in 1..=9 {
            let psf = generate_psf::<f64>(size, 2.0).unwrap();
            let sum: f64 = psf.iter().sum();
            assert!(
                approx_eq(sum, 1.0, 1e-6),
                "PSF sum for size {} = {}, expected ~1.0",
                size,
                sum
            );
        }
    }

    #[test]
    fn test_psf_non_negative() {
        let psf = generate_psf::<f32>(5, 2.0).unwrap();
        assert!(psf.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_psf_symmetric_odd_size() {
        let psf = generate_psf::<f64>(5, 2.0).unwrap();
        for r in 0..5 {
            for c in 0..5 {
                assert!(
                    approx_eq(psf[[r, c]], psf[[4 - r, 4 - c]], 1e-12),
                    "symmetry broken at [{r},{c}]"
                );
            }
        }
    }

    #[test]
    fn test_psf_peak_at_center() {
        let psf = generate_psf::<f64>(5, 2.0).unwrap();
        let max = psf.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(approx_eq(psf[[2, 2]], max, 1e-15));
    }

    #[test]
    fn test_psf_size_one_is_identity() {
        let psf = generate_psf::<f64>(1, 2.0).unwrap();
        assert_eq!(psf.dim(), (1, 1));
        assert!(approx_eq(psf[[0, 0]], 1.0, 1e-12));
    }

    #[test]
    fn test_psf_size_zero_rejected() {
        let err = generate_psf::<f32>(0, 2.0).unwrap_err();
        assert_eq!(err, RestoreError::InvalidParameter { size: 0 });
    }

    #[test]
    fn test_psf_even_size_sums_to_one() {
        let psf = generate_psf::<f64>(4, 2.0).unwrap();
        let sum: f64 = psf.iter().sum();
        assert!(approx_eq(sum, 1.0, 1e-6));
    }

    #[test]
    fn test_non_positive_sigma_degenerates_to_delta() {
        let psf = generate_psf::<f64>(3, 0.0).unwrap();
        assert!(approx_eq(psf[[1, 1]], 1.0, 1e-12));
        let sum: f64 = psf.iter().sum();
        assert!(approx_eq(sum, 1.0, 1e-12));
    }

    #[test]
    fn test_size_for_strength_formula() {
        assert_eq!(psf_size_for_strength(0.0f32), 3);
        assert_eq!(psf_size_for_strength(0.9f32), 3);
        assert_eq!(psf_size_for_strength(1.0f32), 4);
        assert_eq!(psf_size_for_strength(1.5f32), 4);
        assert_eq!(psf_size_for_strength(2.0f32), 5);
    }

    #[test]
    fn test_size_for_strength_coerces_invalid() {
        assert_eq!(psf_size_for_strength(-1.0f64), 3);
        assert_eq!(psf_size_for_strength(f64::NAN), 3);
    }

    #[test]
    fn test_flip_psf_rotates_180() {
        let kernel =
            Array2::from_shape_vec((2, 2), vec![1.0f64, 2.0, 3.0, 4.0]).unwrap();
        let flipped = flip_psf(kernel.view());
        assert_eq!(flipped[[0, 0]], 4.0);
        assert_eq!(flipped[[0, 1]], 3.0);
        assert_eq!(flipped[[1, 0]], 2.0);
        assert_eq!(flipped[[1, 1]], 1.0);
    }
}
