//! Raw mask descriptions supplied by callers.
//!
//! A description is unchecked; the [converter](crate::mask::converter) turns
//! it into a concrete [`Mask`](crate::mask::Mask) or reports why it can't.

use crate::core::error::{MaskError, MaskResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Caller-owned mask: dimensions, real coefficients, optional normalization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaskDescription {
    pub width: usize,
    pub height: usize,
    #[serde(default = "default_bands")]
    pub bands: usize,
    pub coefficients: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
}

/// Largest width or height accepted from the matrix text format.
pub const MAX_MATRIX_DIMENSION: usize = 10_000;

fn default_bands() -> usize {
    1
}

impl MaskDescription {
    /// Create a single-band description with default normalization.
    pub fn new(width: usize, height: usize, coefficients: Vec<f64>) -> Self {
        Self {
            width,
            height,
            bands: 1,
            coefficients,
            scale: None,
            offset: None,
        }
    }

    /// Create a single-band description from rows of coefficients.
    ///
    /// Ragged rows are kept as-is and rejected at conversion time.
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let coefficients = rows.iter().flatten().copied().collect();
        Self::new(width, rows.len(), coefficients)
    }

    /// Set the number of coefficient planes.
    pub fn with_bands(mut self, bands: usize) -> Self {
        self.bands = bands;
        self
    }

    /// Set an explicit scale.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Set an explicit offset.
    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Check the dimensions against the coefficient count.
    pub fn check_dimensions(&self) -> MaskResult<()> {
        if self.width == 0 || self.height == 0 || self.bands == 0 {
            return Err(MaskError::EmptyDimensions {
                width: self.width,
                height: self.height,
                bands: self.bands,
            });
        }
        let expected = self
            .width
            .checked_mul(self.height)
            .and_then(|n| n.checked_mul(self.bands))
            .ok_or(MaskError::LengthMismatch {
                expected: usize::MAX,
                got: self.coefficients.len(),
            })?;
        if expected != self.coefficients.len() {
            return Err(MaskError::LengthMismatch {
                expected,
                got: self.coefficients.len(),
            });
        }
        Ok(())
    }

    /// Check that the mask can be applied to an image with `image_bands` bands.
    pub fn check_bands(&self, image_bands: usize) -> MaskResult<()> {
        if self.bands == 1 || self.bands == image_bands {
            Ok(())
        } else {
            Err(MaskError::BandMismatch {
                mask: self.bands,
                image: image_bands,
            })
        }
    }

    /// Parse the matrix text format.
    ///
    /// ```text
    /// 3 3 16 0
    /// 1 2 1
    /// 2 4 2
    /// 1 2 1
    /// ```
    ///
    /// The header holds width, height and optionally scale and offset. `#`
    /// starts a comment; blank lines are skipped.
    pub fn parse_matrix(source: &str) -> MaskResult<Self> {
        let mut lines = source
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.split('#').next().unwrap_or("").trim()))
            .filter(|(_, line)| !line.is_empty());

        let (header_line, header) = lines.next().ok_or(MaskError::Parse {
            line: 1,
            reason: "missing header".to_string(),
        })?;
        let fields = parse_numbers(header_line, header)?;
        if !(2..=4).contains(&fields.len()) {
            return Err(MaskError::Parse {
                line: header_line,
                reason: format!("header needs 2 to 4 fields, found {}", fields.len()),
            });
        }
        let width = parse_dimension(header_line, fields[0])?;
        let height = parse_dimension(header_line, fields[1])?;

        let mut coefficients = Vec::new();
        let mut rows = 0;
        for (number, line) in lines {
            let row = parse_numbers(number, line)?;
            if row.len() != width {
                return Err(MaskError::Parse {
                    line: number,
                    reason: format!("expected {} values, found {}", width, row.len()),
                });
            }
            coefficients.extend(row);
            rows += 1;
        }
        if rows != height {
            return Err(MaskError::Parse {
                line: header_line,
                reason: format!("header declares {} rows, found {}", height, rows),
            });
        }

        let mut description = Self::new(width, height, coefficients);
        description.scale = fields.get(2).copied();
        description.offset = fields.get(3).copied();
        Ok(description)
    }

    /// Load a description from a file: JSON for `.json`, matrix text otherwise.
    pub fn load(path: impl AsRef<Path>) -> MaskResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| MaskError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if is_json {
            serde_json::from_str(&source).map_err(|e| MaskError::Parse {
                line: e.line(),
                reason: e.to_string(),
            })
        } else {
            Self::parse_matrix(&source)
        }
    }
}

fn parse_numbers(line: usize, text: &str) -> MaskResult<Vec<f64>> {
    text.split_whitespace()
        .map(|token| {
            token.parse::<f64>().map_err(|_| MaskError::Parse {
                line,
                reason: format!("'{}' is not a number", token),
            })
        })
        .collect()
}

fn parse_dimension(line: usize, value: f64) -> MaskResult<usize> {
    if value.fract() != 0.0 || value < 1.0 {
        return Err(MaskError::Parse {
            line,
            reason: format!("dimension {} must be a positive integer", value),
        });
    }
    if value > MAX_MATRIX_DIMENSION as f64 {
        return Err(MaskError::Parse {
            line,
            reason: format!("dimension {} exceeds {}", value, MAX_MATRIX_DIMENSION),
        });
    }
    Ok(value as usize)
}
