//! Restoration session: the parameter recompute controller.
//!
//! An explicit session object replaces the original application's global
//! "currently loaded image" state. The session owns at most one immutable
//! [`RawImage`] snapshot, replaced wholesale on every load, and recomputes the
//! full pipeline synchronously on every parameter change.

use crate::error::{RestoreError, Result};
use crate::float_trait::RestoreFloat;
use crate::pipeline::{restore, RawImage, RestorationParameters, RestoredImage};

/// Holds the currently loaded image and serves parameter-change requests.
///
/// Each parameter change is a fresh, complete recomputation from the original
/// snapshot - nothing is composed across calls and no restoration state
/// survives between them.
#[derive(Debug)]
pub struct RestorationSession<F: RestoreFloat> {
    raw: Option<RawImage<F>>,
}

impl<F: RestoreFloat> Default for RestorationSession<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: RestoreFloat> RestorationSession<F> {
    pub fn new() -> Self {
        Self { raw: None }
    }

    /// Replace the current snapshot with a freshly decoded image.
    pub fn load_image(&mut self, raw: RawImage<F>) {
        self.raw = Some(raw);
    }

    /// Drop the current snapshot, if any.
    pub fn clear(&mut self) {
        self.raw = None;
    }

    /// Borrow the current snapshot.
    pub fn image(&self) -> Option<&RawImage<F>> {
        self.raw.as_ref()
    }

    /// Recompute the restoration for a new parameter set.
    ///
    /// Blocks until the full pipeline completes; the result is display-ready
    /// and ownership moves to the caller.
    ///
    /// # Errors
    ///
    /// `RestoreError::NoImageLoaded` if nothing is loaded; otherwise any
    /// pipeline error, terminal for this request.
    pub fn on_parameter_change(
        &self,
        params: &RestorationParameters<F>,
    ) -> Result<RestoredImage<F>> {
        let raw = self.raw.as_ref().ok_or(RestoreError::NoImageLoaded)?;
        restore(raw, params)
    }
}
