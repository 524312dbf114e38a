//! Individual validation stages.
//!
//! Each stage checks for a specific category of input problems.

use crate::core::error::PipelineError;
use crate::core::types::Raster;

/// Trait for validation stages.
pub trait ValidationStage: Send + Sync {
    /// Name of this validation stage.
    fn name(&self) -> &str;

    /// Validate the input image.
    fn validate(&self, input: &Raster) -> Result<(), PipelineError>;
}

/// Geometry validation - checks the declared extent.
///
/// Verifies:
/// - Width and height are non-zero
/// - The image has at least one band
pub struct GeometryValidation;

impl ValidationStage for GeometryValidation {
    fn name(&self) -> &str {
        "Geometry Validation"
    }

    fn validate(&self, input: &Raster) -> Result<(), PipelineError> {
        if input.width() == 0 || input.height() == 0 || input.bands() == 0 {
            return Err(PipelineError::EmptyGeometry {
                width: input.width(),
                height: input.height(),
                bands: input.bands(),
            });
        }
        Ok(())
    }
}

/// Buffer validation - checks the samples match the geometry.
pub struct BufferValidation;

impl ValidationStage for BufferValidation {
    fn name(&self) -> &str {
        "Buffer Validation"
    }

    fn validate(&self, input: &Raster) -> Result<(), PipelineError> {
        let expected = input.expected_len();
        let got = input.pixels().len();
        if expected != got {
            return Err(PipelineError::BufferLength { expected, got });
        }
        Ok(())
    }
}
