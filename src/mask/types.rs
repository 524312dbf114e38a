//! Concrete convolution masks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric representation of a mask.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Representation {
    Integer,
    Float,
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Representation::Integer => f.write_str("integer"),
            Representation::Float => f.write_str("float"),
        }
    }
}

/// A coefficient type a mask can hold.
pub trait Coefficient: Copy + PartialEq + fmt::Debug + Send + Sync + 'static {
    const REPRESENTATION: Representation;
    const ZERO: Self;
}

impl Coefficient for i32 {
    const REPRESENTATION: Representation = Representation::Integer;
    const ZERO: Self = 0;
}

impl Coefficient for f64 {
    const REPRESENTATION: Representation = Representation::Float;
    const ZERO: Self = 0.0;
}

/// An immutable convolution mask.
///
/// Coefficients are row-major, one `width * height` plane per band. The
/// result of a convolution is `sum(c * p) / scale + offset`.
///
/// Masks are only produced by the [converter](crate::mask::converter), which
/// guarantees the coefficient count matches the dimensions and the scale is
/// non-zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask<T: Coefficient> {
    width: usize,
    height: usize,
    bands: usize,
    coefficients: Vec<T>,
    scale: T,
    offset: T,
}

/// Mask with integer coefficients.
pub type IntMask = Mask<i32>;

/// Mask with floating point coefficients.
pub type FloatMask = Mask<f64>;

impl<T: Coefficient> Mask<T> {
    pub(crate) fn from_parts(
        width: usize,
        height: usize,
        bands: usize,
        coefficients: Vec<T>,
        scale: T,
        offset: T,
    ) -> Self {
        debug_assert_eq!(coefficients.len(), width * height * bands);
        debug_assert!(scale != T::ZERO);
        Self {
            width,
            height,
            bands,
            coefficients,
            scale,
            offset,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    pub fn coefficients(&self) -> &[T] {
        &self.coefficients
    }

    pub fn scale(&self) -> T {
        self.scale
    }

    pub fn offset(&self) -> T {
        self.offset
    }

    pub fn representation(&self) -> Representation {
        T::REPRESENTATION
    }

    /// Horizontal origin of the mask.
    pub fn origin_x(&self) -> usize {
        self.width / 2
    }

    /// Vertical origin of the mask.
    pub fn origin_y(&self) -> usize {
        self.height / 2
    }

    /// Coefficients of the plane applied to image band `band`.
    ///
    /// Single-band masks share their only plane across all image bands.
    pub fn plane(&self, band: usize) -> &[T] {
        let size = self.width * self.height;
        let index = if self.bands == 1 { 0 } else { band };
        &self.coefficients[index * size..(index + 1) * size]
    }
}

impl<T: Coefficient + fmt::Display> fmt::Display for Mask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {} {} scale={} offset={} ({})",
            self.width, self.height, self.bands, self.scale, self.offset, T::REPRESENTATION
        )?;
        for row in self.coefficients.chunks(self.width) {
            let line: Vec<String> = row.iter().map(|c| c.to_string()).collect();
            writeln!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}
