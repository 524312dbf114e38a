//! Error types for convkit.
//!
//! Uses thiserror for structured errors with context. Each build failure maps
//! to exactly one stage so callers can tell whether the parameters, the mask,
//! the input image or the kernel was at fault.

use crate::core::config::PrecisionMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Top-level error returned by a convolution build.
#[derive(Error, Debug)]
pub enum ConvError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(#[from] ParameterError),

    #[error("Invalid mask: {0}")]
    InvalidMask(#[from] MaskError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("{precision} kernel failed: {source}")]
    KernelExecution {
        precision: PrecisionMode,
        #[source]
        source: KernelError,
    },

    #[error("Cannot {operation} a dispatcher in state {state}")]
    InvalidState {
        state: DispatchState,
        operation: &'static str,
    },
}

/// Errors from approximation and precision parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterError {
    #[error("layers must be in [{min}, {max}], got {value}")]
    LayersOutOfRange { value: u32, min: u32, max: u32 },

    #[error("cluster must be in [{min}, {max}], got {value}")]
    ClusterOutOfRange { value: u32, min: u32, max: u32 },

    #[error("Unknown precision '{0}' (expected integer, float or approximate)")]
    UnknownPrecision(String),
}

/// Errors raised while converting a mask description.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MaskError {
    #[error("Mask dimensions must be positive, got {width}x{height}x{bands}")]
    EmptyDimensions {
        width: usize,
        height: usize,
        bands: usize,
    },

    #[error("Mask declares {expected} coefficients but has {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Mask has {mask} bands but the image has {image}")]
    BandMismatch { mask: usize, image: usize },

    #[error("Mask {field} is not finite")]
    NonFinite { field: String },

    #[error("Mask {field} value {value} exceeds the integer kernel limit")]
    IntegerOverflow { field: String, value: f64 },

    #[error("Mask scale is zero")]
    ZeroScale,

    #[error("Mask text line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Cannot read mask file {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Errors from the pre-build validation of the input image.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineError {
    #[error("No input image supplied")]
    MissingInput,

    #[error("Input image has empty geometry {width}x{height}x{bands}")]
    EmptyGeometry { width: u32, height: u32, bands: u32 },

    #[error("Input image buffer holds {got} samples, expected {expected}")]
    BufferLength { expected: usize, got: usize },

    #[error("Unsupported image layout: {0}")]
    UnsupportedLayout(String),
}

/// Errors reported by a convolution kernel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    #[error("Kernel output is {got} but input is {expected}")]
    GeometryMismatch { expected: String, got: String },

    #[error("{0}")]
    Failed(String),
}

/// Errors from loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid parameter: {0}")]
    Parameter(#[from] ParameterError),
}

/// Lifecycle of a [`Dispatcher`](crate::execution::dispatcher::Dispatcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchState {
    Unconfigured,
    Configured,
    Built,
    Failed,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchState::Unconfigured => "unconfigured",
            DispatchState::Configured => "configured",
            DispatchState::Built => "built",
            DispatchState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// The build stage an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Parameters,
    MaskConversion,
    PipelineValidation,
    KernelExecution,
    Lifecycle,
}

// ============================================================================
// Error Utilities
// ============================================================================

impl ConvError {
    /// Get the stage that produced this error.
    pub fn stage(&self) -> Stage {
        match self {
            ConvError::InvalidParameter(_) => Stage::Parameters,
            ConvError::InvalidMask(_) => Stage::MaskConversion,
            ConvError::Pipeline(_) => Stage::PipelineValidation,
            ConvError::KernelExecution { .. } => Stage::KernelExecution,
            ConvError::InvalidState { .. } => Stage::Lifecycle,
        }
    }

    /// Get the precision path that was active when a kernel failed.
    pub fn precision(&self) -> Option<PrecisionMode> {
        match self {
            ConvError::KernelExecution { precision, .. } => Some(*precision),
            _ => None,
        }
    }
}

impl MaskError {
    pub(crate) fn non_finite(field: impl Into<String>) -> Self {
        MaskError::NonFinite { field: field.into() }
    }

    pub(crate) fn overflow(field: impl Into<String>, value: f64) -> Self {
        MaskError::IntegerOverflow {
            field: field.into(),
            value,
        }
    }
}

/// Result type alias for convolution builds.
pub type ConvResult<T> = Result<T, ConvError>;

/// Result type alias for mask conversion.
pub type MaskResult<T> = Result<T, MaskError>;

/// Result type alias for kernel execution.
pub type KernelResult<T> = Result<T, KernelError>;
