//! Core types for the convkit convolution engine.
//!
//! This module contains the foundational types shared by the masks, the
//! kernels and the dispatcher:
//! - Raster images and pixel formats
//! - Precision and approximation configuration
//! - Error types

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{ApproximationParams, ConvolutionConfig, PrecisionMode};
pub use error::{ConvError, KernelError, MaskError, ParameterError, PipelineError};
pub use types::{PixelBuffer, PixelFormat, Raster, Sample};
