//! Convolution execution.
//!
//! The dispatcher selects a strategy by precision and runs it in stages.

pub mod dispatcher;
pub mod request;
pub mod strategy;

pub use dispatcher::Dispatcher;
pub use request::{convolve, ConvolutionRequest};
pub use strategy::{ApproximateStrategy, ConvolutionStrategy, FloatStrategy, IntegerStrategy};
