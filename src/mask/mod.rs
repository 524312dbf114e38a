//! Convolution masks.
//!
//! A caller supplies a [`MaskDescription`]; the [`converter`] turns it into
//! an integer or floating point [`Mask`] for the selected kernel.

pub mod converter;
pub mod description;
pub mod types;

pub use converter::{to_float, to_integer, INT_COEFFICIENT_LIMIT};
pub use description::{MaskDescription, MAX_MATRIX_DIMENSION};
pub use types::{Coefficient, FloatMask, IntMask, Mask, Representation};
