//! Single-pass linear enhancement operations.
//!
//! These are the four enhancement sliders of the original application:
//! brightness, contrast, saturation, sharpness. Each is a stateless pixel
//! transform with Pillow `ImageEnhance` semantics - the result interpolates
//! between a fully degenerate image and the original, with factor 1.0 the
//! identity and the UI exposing factors in [0, 2].
//!
//! Unlike restoration these carry no iterative state; they are grouped here
//! as the interface the UI collaborator calls alongside the pipeline.

use ndarray::Array2;

use crate::deconvolution::correlate_2d;
use crate::float_trait::RestoreFloat;
use crate::pipeline::{clip_unit, RawImage, RestoredImage, CHANNEL_COUNT};

// =============================================================================
// Constants
// =============================================================================

/// Rec. 601 luma weights for the red, green, blue planes.
const LUMA_WEIGHTS: [f64; CHANNEL_COUNT] = [0.299, 0.587, 0.114];

/// 3x3 smoothing kernel used as the sharpness degenerate image
/// (Pillow's `SMOOTH` filter: center 5, neighbors 1, scale 13).
const SMOOTH_CENTER: f64 = 5.0;
const SMOOTH_SCALE: f64 = 13.0;

fn coerce_factor<F: RestoreFloat>(factor: F) -> F {
    if factor.is_finite() && factor > F::zero() {
        factor
    } else {
        F::zero()
    }
}

/// Per-pixel luma plane of an image.
fn luma_plane<F: RestoreFloat>(raw: &RawImage<F>) -> Array2<F> {
    let planes = raw.planes();
    let mut luma = Array2::zeros(raw.dim());
    for (plane, &weight) in planes.iter().zip(LUMA_WEIGHTS.iter()) {
        let w = F::from_f64_c(weight);
        luma.zip_mut_with(plane, |l, &v| *l += w * v);
    }
    luma
}

// =============================================================================
// Operations
// =============================================================================

/// Scale every sample by `factor`. Factor 0 is black, 1 the original.
pub fn adjust_brightness<F: RestoreFloat>(raw: &RawImage<F>, factor: F) -> RestoredImage<F> {
    let factor = coerce_factor(factor);
    let planes = raw
        .planes()
        .clone()
        .map(|plane| clip_unit(plane.mapv(|v| v * factor)));
    RestoredImage::from_planes(planes)
}

/// Interpolate every sample against the image's mean luminance.
/// Factor 0 is a solid gray image, 1 the original.
pub fn adjust_contrast<F: RestoreFloat>(raw: &RawImage<F>, factor: F) -> RestoredImage<F> {
    let factor = coerce_factor(factor);
    let luma = luma_plane(raw);
    let (rows, cols) = raw.dim();
    let count = F::usize_as((rows * cols).max(1));
    let mean: F = luma.iter().copied().sum::<F>() / count;

    let planes = raw
        .planes()
        .clone()
        .map(|plane| clip_unit(plane.mapv(|v| mean + (v - mean) * factor)));
    RestoredImage::from_planes(planes)
}

/// Interpolate every pixel against its own luma. Factor 0 is grayscale,
/// 1 the original.
pub fn adjust_saturation<F: RestoreFloat>(raw: &RawImage<F>, factor: F) -> RestoredImage<F> {
    let factor = coerce_factor(factor);
    let luma = luma_plane(raw);

    let planes = raw.planes().clone().map(|mut plane| {
        plane.zip_mut_with(&luma, |v, &l| *v = l + (*v - l) * factor);
        clip_unit(plane)
    });
    RestoredImage::from_planes(planes)
}

/// Interpolate every pixel against a 3x3-smoothed copy of its plane.
/// Factor 0 is the smoothed image, 1 the original, above 1 sharpens.
pub fn adjust_sharpness<F: RestoreFloat>(raw: &RawImage<F>, factor: F) -> RestoredImage<F> {
    let factor = coerce_factor(factor);
    let scale = F::from_f64_c(1.0 / SMOOTH_SCALE);
    let mut kernel = Array2::from_elem((3, 3), scale);
    kernel[[1, 1]] = F::from_f64_c(SMOOTH_CENTER / SMOOTH_SCALE);

    let planes = raw.planes().clone().map(|plane| {
        let mut smooth = correlate_2d(plane.view(), kernel.view());
        smooth.zip_mut_with(&plane, |s, &v| *s = *s + (v - *s) * factor);
        clip_unit(smooth)
    });
    RestoredImage::from_planes(planes)
}

// =============================================================================
// Tests
// =============================================================================
