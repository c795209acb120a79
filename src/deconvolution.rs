//! Richardson-Lucy deconvolution of a single intensity channel.
//!
//! The convolution hot path follows the same discipline as the rest of the
//! restoration code: reflect-padded input buffers so the inner loop is
//! branchless, contiguous row-major access, and rayon row-parallelism above a
//! minimum plane size.

use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;

use crate::error::{RestoreError, Result};
use crate::float_trait::RestoreFloat;
use crate::psf::flip_psf;

// =============================================================================
// Constants
// =============================================================================

/// Forward-blur values below this threshold are treated as the threshold
/// itself when forming the ratio field, guarding the division.
const RATIO_EPSILON: f64 = 1e-12;

/// Minimum row count for parallel convolution. Set high enough to avoid
/// rayon overhead on thumbnail-sized planes.
const PARALLEL_ROW_THRESHOLD: usize = 128;

// =============================================================================
// Convolution primitives
// =============================================================================

/// Reflect index for boundary handling.
/// For an array of length n, reflects indices outside [0, n-1]:
/// reflect(-1) = 0, reflect(-2) = 1, reflect(n) = n-2, reflect(n+1) = n-3
///
/// The two borders use different conventions: below zero the edge sample is
/// repeated (scipy 'reflect'), past the end the edge sample is not (scipy
/// 'mirror'). Both avoid artificial zeros at the borders; callers must not
/// rely on the padding being symmetric.
#[inline(always)]
fn reflect_index(idx: isize, len: usize) -> usize {
    let n = len as isize;
    if idx < 0 {
        (-idx - 1).min(n - 1) as usize
    } else if idx >= n {
        let excess = idx - n;
        (n - 2 - excess).max(0) as usize
    } else {
        idx as usize
    }
}

/// Pad a plane with reflected borders sized for a kernel anchored at
/// `((krows - 1) / 2, (kcols - 1) / 2)`.
fn pad_reflect<F: RestoreFloat>(
    plane: ArrayView2<F>,
    krows: usize,
    kcols: usize,
) -> Array2<F> {
    let (rows, cols) = plane.dim();
    let anchor_r = (krows - 1) / 2;
    let anchor_c = (kcols - 1) / 2;

    Array2::from_shape_fn((rows + krows - 1, cols + kcols - 1), |(pr, pc)| {
        let r = reflect_index(pr as isize - anchor_r as isize, rows);
        let c = reflect_index(pc as isize - anchor_c as isize, cols);
        plane[[r, c]]
    })
}

/// Correlate a plane with a kernel (kernel unflipped), reflect boundaries.
///
/// Output has the same shape as the input plane. Rows are processed in
/// parallel once the plane is large enough to amortize the fork cost.
pub fn correlate_2d<F: RestoreFloat>(plane: ArrayView2<F>, kernel: ArrayView2<F>) -> Array2<F> {
    let (rows, cols) = plane.dim();
    let (krows, kcols) = kernel.dim();

    if rows == 0 || cols == 0 {
        return Array2::zeros((rows, cols));
    }

    let padded = pad_reflect(plane, krows, kcols);
    let kernel_flat: Vec<F> = kernel.iter().copied().collect();

    let compute_row = |r: usize, out_row: &mut [F]| {
        for (c, out) in out_row.iter_mut().enumerate() {
            let mut sum = F::zero();
            let mut k = 0;
            for i in 0..krows {
                for j in 0..kcols {
                    sum += padded[[r + i, c + j]] * kernel_flat[k];
                    k += 1;
                }
            }
            *out = sum;
        }
    };

    let mut output = Array2::zeros((rows, cols));
    if rows >= PARALLEL_ROW_THRESHOLD {
        let output_rows: Vec<_> = output.axis_iter_mut(Axis(0)).collect();
        output_rows
            .into_par_iter()
            .enumerate()
            .for_each(|(r, mut out_row)| {
                // Rows of a freshly allocated Array2 are contiguous.
                let out_slice = out_row.as_slice_mut().unwrap();
                compute_row(r, out_slice);
            });
    } else {
        for r in 0..rows {
            let out_slice = output.row_mut(r).into_slice().unwrap();
            compute_row(r, out_slice);
        }
    }

    output
}

/// Convolve a plane with a kernel (kernel flipped 180 degrees), reflect
/// boundaries.
pub fn convolve_2d<F: RestoreFloat>(plane: ArrayView2<F>, kernel: ArrayView2<F>) -> Array2<F> {
    let flipped = flip_psf(kernel);
    correlate_2d(plane, flipped.view())
}

// =============================================================================
// Richardson-Lucy
// =============================================================================

/// Richardson-Lucy iterative deconvolution of one channel.
///
/// Multiplicative maximum-likelihood update under a Poisson noise model:
///
/// 1. `u_0 = observed`
/// 2. per iteration: `blurred = convolve(u, psf)`,
///    `ratio = observed / max(blurred, eps)`,
///    `u *= convolve(ratio, flip(psf))`
///
/// Runs exactly `max(iterations, 1)` rounds - there is no convergence
/// early-exit; the iteration count is the behavioral contract. The returned
/// estimate is not clipped; final range clamping belongs to the pipeline.
///
/// # Errors
///
/// `RestoreError::KernelSize` if the PSF is taller or wider than the channel.
pub fn richardson_lucy<F: RestoreFloat>(
    observed: ArrayView2<F>,
    psf: ArrayView2<F>,
    iterations: usize,
) -> Result<Array2<F>> {
    let (rows, cols) = observed.dim();
    let (krows, kcols) = psf.dim();

    if krows > rows || kcols > cols {
        return Err(RestoreError::KernelSize {
            psf: krows.max(kcols),
            rows,
            cols,
        });
    }

    let iterations = iterations.max(1);
    let eps = F::from_f64_c(RATIO_EPSILON);

    // convolve(x, psf) == correlate(x, flip(psf)); precompute the flip once.
    let psf_flipped = flip_psf(psf);

    let mut estimate = observed.to_owned();
    for _ in 0..iterations {
        let blurred = correlate_2d(estimate.view(), psf_flipped.view());

        let mut ratio = observed.to_owned();
        ratio.zip_mut_with(&blurred, |r, &b| {
            let denom = if b > eps { b } else { eps };
            *r = *r / denom;
        });

        // convolve(ratio, flip(psf)) == correlate(ratio, psf)
        let correction = correlate_2d(ratio.view(), psf);
        estimate.zip_mut_with(&correction, |u, &c| *u *= c);
    }

    Ok(estimate)
}

// =============================================================================
// Tests
// =============================================================================
