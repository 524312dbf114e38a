//! Convolution kernels.
//!
//! The dispatcher talks to kernels only through the [`IntegerKernel`],
//! [`FloatKernel`] and [`ApproximateKernel`] traits, so any of them can be
//! replaced. The defaults share these conventions:
//!
//! - the mask origin is at `(width / 2, height / 2)`
//! - masks are applied without flipping (correlation)
//! - samples outside the image repeat the nearest edge pixel
//! - output rows are computed in parallel with rayon

pub mod approximate;
pub mod exact;

pub use approximate::LayeredApproxKernel;
pub use exact::{ExactFloatKernel, ExactIntegerKernel};

use crate::core::config::ApproximationParams;
use crate::core::error::{KernelError, KernelResult};
use crate::core::types::{Raster, Sample};
use crate::mask::types::{FloatMask, IntMask};
use rayon::prelude::*;
use std::sync::Arc;

/// Exact convolution with an integer mask.
pub trait IntegerKernel: Send + Sync {
    /// Convolve `input`, returning an image of the same layout.
    fn run(&self, input: &Raster, mask: &IntMask) -> KernelResult<Raster>;
}

/// Exact convolution with a floating point mask.
pub trait FloatKernel: Send + Sync {
    /// Convolve `input`, returning an image of the same layout.
    fn run(&self, input: &Raster, mask: &FloatMask) -> KernelResult<Raster>;
}

/// Approximate convolution with a floating point mask.
pub trait ApproximateKernel: Send + Sync {
    /// Convolve `input` within the accuracy `params` allow.
    fn run(
        &self,
        input: &Raster,
        mask: &FloatMask,
        params: &ApproximationParams,
    ) -> KernelResult<Raster>;
}

/// The three kernels a dispatcher can select from.
#[derive(Clone)]
pub struct KernelSet {
    /// Used for [`PrecisionMode::Integer`](crate::core::config::PrecisionMode::Integer)
    pub integer: Arc<dyn IntegerKernel>,
    /// Used for [`PrecisionMode::Float`](crate::core::config::PrecisionMode::Float)
    pub float: Arc<dyn FloatKernel>,
    /// Used for [`PrecisionMode::Approximate`](crate::core::config::PrecisionMode::Approximate)
    pub approximate: Arc<dyn ApproximateKernel>,
}

impl KernelSet {
    /// Replace the integer kernel.
    pub fn with_integer(mut self, kernel: impl IntegerKernel + 'static) -> Self {
        self.integer = Arc::new(kernel);
        self
    }

    /// Replace the float kernel.
    pub fn with_float(mut self, kernel: impl FloatKernel + 'static) -> Self {
        self.float = Arc::new(kernel);
        self
    }

    /// Replace the approximate kernel.
    pub fn with_approximate(mut self, kernel: impl ApproximateKernel + 'static) -> Self {
        self.approximate = Arc::new(kernel);
        self
    }
}

impl Default for KernelSet {
    fn default() -> Self {
        Self {
            integer: Arc::new(ExactIntegerKernel),
            float: Arc::new(ExactFloatKernel),
            approximate: Arc::new(LayeredApproxKernel),
        }
    }
}

impl std::fmt::Debug for KernelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelSet").finish_non_exhaustive()
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Image and mask extents a kernel works with.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Geometry {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub mask_width: usize,
    pub mask_height: usize,
}

impl Geometry {
    /// Check that `input` is consistent and the mask fits its bands.
    pub fn check(
        input: &Raster,
        mask_width: usize,
        mask_height: usize,
        mask_bands: usize,
    ) -> KernelResult<Self> {
        if input.expected_len() == 0 {
            return Err(KernelError::Failed(format!("empty image {}", input.layout())));
        }
        if input.pixels().len() != input.expected_len() {
            return Err(KernelError::Failed(format!(
                "buffer of {} samples does not match {}",
                input.pixels().len(),
                input.layout()
            )));
        }
        let bands = input.bands() as usize;
        if mask_bands != 1 && mask_bands != bands {
            return Err(KernelError::Failed(format!(
                "{}-band mask cannot be applied to a {}-band image",
                mask_bands, bands
            )));
        }
        Ok(Self {
            width: input.width() as usize,
            height: input.height() as usize,
            bands,
            mask_width,
            mask_height,
        })
    }

    pub fn row_len(&self) -> usize {
        self.width * self.bands
    }
}

/// Index of `pos` clamped to `0..len`.
#[inline]
pub(crate) fn clamp_coord(pos: isize, len: usize) -> usize {
    pos.clamp(0, len as isize - 1) as usize
}

/// Fill `out` one row at a time in parallel, allocating it on first use.
pub(crate) fn fill_rows<S, F>(geometry: &Geometry, out: &mut Vec<S>, compute_row: F) -> KernelResult<()>
where
    S: Sample,
    F: Fn(usize, &mut [S]) -> KernelResult<()> + Sync + Send,
{
    let row_len = geometry.row_len();
    if out.is_empty() {
        out.resize(row_len * geometry.height, S::from_i64(0));
    }
    if row_len == 0 {
        return Ok(());
    }
    out.par_chunks_mut(row_len)
        .enumerate()
        .try_for_each(|(y, row)| compute_row(y, row))
}
