//! One-shot convolution requests.

use crate::core::config::ConvolutionConfig;
use crate::core::error::ConvResult;
use crate::core::types::Raster;
use crate::execution::dispatcher::Dispatcher;
use crate::mask::description::MaskDescription;

/// Everything one convolution needs, consumed by [`execute`](Self::execute).
#[derive(Debug, Clone)]
pub struct ConvolutionRequest<'a> {
    /// Input image, borrowed from the caller
    pub input: Option<&'a Raster>,
    /// Raw mask, borrowed from the caller
    pub mask: &'a MaskDescription,
    /// Precision and approximation parameters
    pub config: ConvolutionConfig,
}

impl<'a> ConvolutionRequest<'a> {
    /// Create a request with the default configuration.
    pub fn new(input: &'a Raster, mask: &'a MaskDescription) -> Self {
        Self {
            input: Some(input),
            mask,
            config: ConvolutionConfig::default(),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: ConvolutionConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the request on a fresh default dispatcher.
    pub fn execute(self) -> ConvResult<Raster> {
        self.execute_with(Dispatcher::new())
    }

    /// Run the request on the given unconfigured dispatcher.
    pub fn execute_with(self, mut dispatcher: Dispatcher) -> ConvResult<Raster> {
        dispatcher.configure_with(self.config)?;
        dispatcher.build(self.input, self.mask)
    }
}

/// Convolve `input` with `mask`.
///
/// The output has the same width, height, band count and pixel format as
/// the input.
///
/// ```
/// use convkit::prelude::*;
///
/// let input = Raster::from_u8(2, 2, 1, vec![10, 20, 30, 40]);
/// let mask = MaskDescription::new(1, 1, vec![1.0]);
/// let output = convolve(&input, &mask, &ConvolutionConfig::default()).unwrap();
/// assert_eq!(output, input);
/// ```
pub fn convolve(
    input: &Raster,
    mask: &MaskDescription,
    config: &ConvolutionConfig,
) -> ConvResult<Raster> {
    ConvolutionRequest::new(input, mask)
        .with_config(*config)
        .execute()
}
