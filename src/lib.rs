//! # convkit - Image Convolution Dispatch
//!
//! convkit convolves raster images with a mask using one of three
//! precisions behind a single entry point.
//!
//! ## Features
//!
//! - **Exact integer**: the mask is rounded to integers and evaluated in
//!   `i64`, bit-exact for integer images
//! - **Exact float**: the mask is evaluated in `f64`
//! - **Approximate**: the mask is decomposed into layered lines evaluated
//!   with sliding sums, trading accuracy for speed through `layers` and
//!   `cluster`
//! - **Same layout out as in**: the output always has the width, height,
//!   band count and pixel format of the input
//! - **Swappable kernels**: each precision's kernel sits behind a trait
//!
//! ## Quick Start
//!
//! ```rust
//! use convkit::prelude::*;
//!
//! let input = Raster::filled(8, 8, 1, PixelFormat::U8, 50.0);
//! let mask = MaskDescription::new(3, 3, vec![1.0; 9]);
//!
//! let config = ConvolutionConfig::builder()
//!     .precision(PrecisionMode::Approximate)
//!     .layers(10)
//!     .cluster(1)
//!     .build()
//!     .unwrap();
//!
//! let output = convolve(&input, &mask, &config).unwrap();
//! assert_eq!(output, input);
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: Raster types, configuration and errors
//! - [`mask`]: Mask descriptions and conversion to integer or float masks
//! - [`validation`]: Pre-build validation of input images
//! - [`kernels`]: Kernel traits and the default kernels
//! - [`execution`]: Strategies, the dispatcher and one-shot requests
//!
//! ## Using the Dispatcher Directly
//!
//! ```rust
//! use convkit::prelude::*;
//!
//! let input = Raster::from_u8(2, 2, 1, vec![10, 20, 30, 40]);
//! let mask = MaskDescription::new(1, 1, vec![1.0]);
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.configure(PrecisionMode::Float, 5, 1).unwrap();
//! let output = dispatcher.build(Some(&input), &mask).unwrap();
//!
//! assert_eq!(output, input);
//! assert_eq!(dispatcher.state(), DispatchState::Built);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod execution;
pub mod kernels;
pub mod mask;
pub mod validation;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust
/// use convkit::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::types::{PixelBuffer, PixelFormat, Raster, Sample};

    // Configuration
    pub use crate::core::config::{
        ApproximationParams, ConvolutionConfig, ConvolutionConfigBuilder, PrecisionMode,
    };

    // Errors
    pub use crate::core::error::{
        ConfigError, ConvError, ConvResult, DispatchState, KernelError, MaskError,
        ParameterError, PipelineError, Stage,
    };

    // Masks
    pub use crate::mask::{
        to_float, to_integer, FloatMask, IntMask, Mask, MaskDescription, Representation,
    };

    // Validation
    pub use crate::validation::{PreBuildValidator, ValidationPipeline, ValidationStage};

    // Kernels
    pub use crate::kernels::{
        ApproximateKernel, ExactFloatKernel, ExactIntegerKernel, FloatKernel, IntegerKernel,
        KernelSet, LayeredApproxKernel,
    };

    // Execution
    pub use crate::execution::{convolve, ConvolutionRequest, ConvolutionStrategy, Dispatcher};
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
