//! Precision strategies.
//!
//! A strategy pairs the mask conversion a precision needs with the kernel
//! that consumes the converted mask. The dispatcher picks one per build.

use crate::core::config::{ApproximationParams, PrecisionMode};
use crate::core::error::{KernelResult, MaskResult};
use crate::core::types::Raster;
use crate::kernels::{ApproximateKernel, FloatKernel, IntegerKernel};
use crate::mask::converter;
use crate::mask::description::MaskDescription;
use crate::mask::types::{FloatMask, IntMask};

/// Converts a mask and runs the matching kernel.
pub trait ConvolutionStrategy {
    /// Concrete mask type the kernel consumes.
    type Mask;

    /// Precision this strategy implements.
    fn precision(&self) -> PrecisionMode;

    /// Convert the caller's description.
    fn convert(&self, description: &MaskDescription) -> MaskResult<Self::Mask>;

    /// Run the kernel.
    fn execute(&self, input: &Raster, mask: &Self::Mask) -> KernelResult<Raster>;
}

/// Exact integer arithmetic.
pub struct IntegerStrategy<'a> {
    kernel: &'a dyn IntegerKernel,
}

impl<'a> IntegerStrategy<'a> {
    pub fn new(kernel: &'a dyn IntegerKernel) -> Self {
        Self { kernel }
    }
}

impl ConvolutionStrategy for IntegerStrategy<'_> {
    type Mask = IntMask;

    fn precision(&self) -> PrecisionMode {
        PrecisionMode::Integer
    }

    fn convert(&self, description: &MaskDescription) -> MaskResult<IntMask> {
        converter::to_integer(description)
    }

    fn execute(&self, input: &Raster, mask: &IntMask) -> KernelResult<Raster> {
        self.kernel.run(input, mask)
    }
}

/// Exact floating point arithmetic.
pub struct FloatStrategy<'a> {
    kernel: &'a dyn FloatKernel,
}

impl<'a> FloatStrategy<'a> {
    pub fn new(kernel: &'a dyn FloatKernel) -> Self {
        Self { kernel }
    }
}

impl ConvolutionStrategy for FloatStrategy<'_> {
    type Mask = FloatMask;

    fn precision(&self) -> PrecisionMode {
        PrecisionMode::Float
    }

    fn convert(&self, description: &MaskDescription) -> MaskResult<FloatMask> {
        converter::to_float(description)
    }

    fn execute(&self, input: &Raster, mask: &FloatMask) -> KernelResult<Raster> {
        self.kernel.run(input, mask)
    }
}

/// Approximate evaluation of a float mask.
pub struct ApproximateStrategy<'a> {
    kernel: &'a dyn ApproximateKernel,
    params: ApproximationParams,
}

impl<'a> ApproximateStrategy<'a> {
    pub fn new(kernel: &'a dyn ApproximateKernel, params: ApproximationParams) -> Self {
        Self { kernel, params }
    }
}

impl ConvolutionStrategy for ApproximateStrategy<'_> {
    type Mask = FloatMask;

    fn precision(&self) -> PrecisionMode {
        PrecisionMode::Approximate
    }

    fn convert(&self, description: &MaskDescription) -> MaskResult<FloatMask> {
        converter::to_float(description)
    }

    fn execute(&self, input: &Raster, mask: &FloatMask) -> KernelResult<Raster> {
        self.kernel.run(input, mask, &self.params)
    }
}
