//! Pre-build validation of input images.
//!
//! Validation runs before any mask is converted or kernel invoked, so a bad
//! input never reaches the pixel loops.

pub mod pipeline;
pub mod stages;

pub use pipeline::{PreBuildValidator, ValidationPipeline};
pub use stages::{BufferValidation, GeometryValidation, ValidationStage};
