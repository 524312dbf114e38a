//! Validation pipeline implementation.

use crate::core::error::PipelineError;
use crate::core::types::Raster;
use crate::validation::stages::{BufferValidation, GeometryValidation, ValidationStage};
use std::time::Instant;

/// Checks run on the input image before any mask is converted.
pub trait PreBuildValidator: Send + Sync {
    /// Validate the input, returning it when it is usable.
    fn validate<'a>(&self, input: Option<&'a Raster>) -> Result<&'a Raster, PipelineError>;
}

/// Multi-stage validation pipeline.
///
/// Runs a series of validation stages on the input image. The first
/// failing stage stops the pipeline.
pub struct ValidationPipeline {
    stages: Vec<Box<dyn ValidationStage>>,
}

impl ValidationPipeline {
    /// Create a new pipeline with the given stages.
    pub fn new(stages: Vec<Box<dyn ValidationStage>>) -> Self {
        Self { stages }
    }

    /// Create the default validation pipeline with all standard stages.
    pub fn default_pipeline() -> Self {
        Self {
            stages: vec![Box::new(GeometryValidation), Box::new(BufferValidation)],
        }
    }

    /// Add a custom validation stage.
    pub fn add_stage(&mut self, stage: Box<dyn ValidationStage>) {
        self.stages.push(stage);
    }

    /// Names of the configured stages, in order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl PreBuildValidator for ValidationPipeline {
    fn validate<'a>(&self, input: Option<&'a Raster>) -> Result<&'a Raster, PipelineError> {
        let start = Instant::now();
        let input = input.ok_or(PipelineError::MissingInput)?;

        for stage in &self.stages {
            if let Err(error) = stage.validate(input) {
                log::debug!("{} rejected {}: {}", stage.name(), input.layout(), error);
                return Err(error);
            }
        }

        log::trace!(
            "validated {} in {} us",
            input.layout(),
            start.elapsed().as_micros()
        );
        Ok(input)
    }
}

impl Default for ValidationPipeline {
    fn default() -> Self {
        Self::default_pipeline()
    }
}
