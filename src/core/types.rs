//! Raster image types consumed and produced by the convolution kernels.
//!
//! Samples are stored band-interleaved, row-major, in one of a closed set of
//! pixel formats. The enum keeps dispatch over formats exhaustive, while the
//! [`Sample`] trait lets kernels be written once over any sample type.

use crate::core::error::PipelineError;
use image::{DynamicImage, ImageBuffer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pixel sample formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Unsigned 8-bit
    U8,
    /// Unsigned 16-bit
    U16,
    /// 32-bit floating point
    F32,
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PixelFormat::U8 => "u8",
            PixelFormat::U16 => "u16",
            PixelFormat::F32 => "f32",
        };
        f.write_str(name)
    }
}

/// Interleaved sample storage.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelBuffer {
    U8(Vec<u8>),
    U16(Vec<u16>),
    F32(Vec<f32>),
}

impl PixelBuffer {
    /// Get the format of the stored samples.
    pub fn format(&self) -> PixelFormat {
        match self {
            PixelBuffer::U8(_) => PixelFormat::U8,
            PixelBuffer::U16(_) => PixelFormat::U16,
            PixelBuffer::F32(_) => PixelFormat::F32,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            PixelBuffer::U8(v) => v.len(),
            PixelBuffer::U16(v) => v.len(),
            PixelBuffer::F32(v) => v.len(),
        }
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a sample as `f64`.
    pub fn get_f64(&self, index: usize) -> Option<f64> {
        match self {
            PixelBuffer::U8(v) => v.get(index).map(|s| s.to_f64()),
            PixelBuffer::U16(v) => v.get(index).map(|s| s.to_f64()),
            PixelBuffer::F32(v) => v.get(index).map(|s| s.to_f64()),
        }
    }
}

/// A pixel sample type the kernels can read and write.
pub trait Sample: Copy + Send + Sync + 'static {
    /// Widen to `f64`.
    fn to_f64(self) -> f64;

    /// Widen to `i64`. Only meaningful for integral formats.
    fn to_i64(self) -> i64;

    /// Narrow an integer result, clamping to the format range.
    fn from_i64(value: i64) -> Self;

    /// Narrow a real result: integral formats round to nearest and clamp.
    fn from_f64(value: f64) -> Self;
}

impl Sample for u8 {
    fn to_f64(self) -> f64 {
        self as f64
    }

    fn to_i64(self) -> i64 {
        self as i64
    }

    fn from_i64(value: i64) -> Self {
        value.clamp(0, u8::MAX as i64) as u8
    }

    fn from_f64(value: f64) -> Self {
        // `as` saturates and maps NaN to 0
        value.round() as u8
    }
}

impl Sample for u16 {
    fn to_f64(self) -> f64 {
        self as f64
    }

    fn to_i64(self) -> i64 {
        self as i64
    }

    fn from_i64(value: i64) -> Self {
        value.clamp(0, u16::MAX as i64) as u16
    }

    fn from_f64(value: f64) -> Self {
        value.round() as u16
    }
}

impl Sample for f32 {
    fn to_f64(self) -> f64 {
        self as f64
    }

    fn to_i64(self) -> i64 {
        self as i64
    }

    fn from_i64(value: i64) -> Self {
        value as f32
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

/// An in-memory raster image.
///
/// Construction does not check that the buffer matches the declared
/// geometry; that is the job of the pre-build validation pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: u32,
    height: u32,
    bands: u32,
    pixels: PixelBuffer,
}

impl Raster {
    /// Create a raster from its parts.
    pub fn new(width: u32, height: u32, bands: u32, pixels: PixelBuffer) -> Self {
        Self {
            width,
            height,
            bands,
            pixels,
        }
    }

    /// Create an 8-bit raster.
    pub fn from_u8(width: u32, height: u32, bands: u32, samples: Vec<u8>) -> Self {
        Self::new(width, height, bands, PixelBuffer::U8(samples))
    }

    /// Create a 16-bit raster.
    pub fn from_u16(width: u32, height: u32, bands: u32, samples: Vec<u16>) -> Self {
        Self::new(width, height, bands, PixelBuffer::U16(samples))
    }

    /// Create a floating point raster.
    pub fn from_f32(width: u32, height: u32, bands: u32, samples: Vec<f32>) -> Self {
        Self::new(width, height, bands, PixelBuffer::F32(samples))
    }

    /// Create a raster with every sample set to `value`.
    pub fn filled(width: u32, height: u32, bands: u32, format: PixelFormat, value: f64) -> Self {
        let len = width as usize * height as usize * bands as usize;
        let pixels = match format {
            PixelFormat::U8 => PixelBuffer::U8(vec![u8::from_f64(value); len]),
            PixelFormat::U16 => PixelBuffer::U16(vec![u16::from_f64(value); len]),
            PixelFormat::F32 => PixelBuffer::F32(vec![f32::from_f64(value); len]),
        };
        Self::new(width, height, bands, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bands(&self) -> u32 {
        self.bands
    }

    pub fn format(&self) -> PixelFormat {
        self.pixels.format()
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Number of samples the declared geometry requires.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.bands as usize
    }

    /// Whether `other` has the same width, height, bands and format.
    pub fn same_layout(&self, other: &Raster) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.bands == other.bands
            && self.format() == other.format()
    }

    /// Short layout description, e.g. `640x480x3 u8`.
    pub fn layout(&self) -> String {
        format!("{}x{}x{} {}", self.width, self.height, self.bands, self.format())
    }

    /// Read one sample as `f64`.
    pub fn sample(&self, x: u32, y: u32, band: u32) -> Option<f64> {
        if x >= self.width || y >= self.height || band >= self.bands {
            return None;
        }
        let index = (y as usize * self.width as usize + x as usize) * self.bands as usize
            + band as usize;
        self.pixels.get_f64(index)
    }

    /// Convert to an `image` crate buffer for encoding.
    pub fn to_dynamic(&self) -> Result<DynamicImage, PipelineError> {
        let (w, h) = (self.width, self.height);
        let unsupported = || PipelineError::UnsupportedLayout(self.layout());
        let image = match (&self.pixels, self.bands) {
            (PixelBuffer::U8(v), 1) => {
                DynamicImage::ImageLuma8(ImageBuffer::from_raw(w, h, v.clone()).ok_or_else(unsupported)?)
            }
            (PixelBuffer::U8(v), 2) => {
                DynamicImage::ImageLumaA8(ImageBuffer::from_raw(w, h, v.clone()).ok_or_else(unsupported)?)
            }
            (PixelBuffer::U8(v), 3) => {
                DynamicImage::ImageRgb8(ImageBuffer::from_raw(w, h, v.clone()).ok_or_else(unsupported)?)
            }
            (PixelBuffer::U8(v), 4) => {
                DynamicImage::ImageRgba8(ImageBuffer::from_raw(w, h, v.clone()).ok_or_else(unsupported)?)
            }
            (PixelBuffer::U16(v), 1) => {
                DynamicImage::ImageLuma16(ImageBuffer::from_raw(w, h, v.clone()).ok_or_else(unsupported)?)
            }
            (PixelBuffer::U16(v), 2) => {
                DynamicImage::ImageLumaA16(ImageBuffer::from_raw(w, h, v.clone()).ok_or_else(unsupported)?)
            }
            (PixelBuffer::U16(v), 3) => {
                DynamicImage::ImageRgb16(ImageBuffer::from_raw(w, h, v.clone()).ok_or_else(unsupported)?)
            }
            (PixelBuffer::U16(v), 4) => {
                DynamicImage::ImageRgba16(ImageBuffer::from_raw(w, h, v.clone()).ok_or_else(unsupported)?)
            }
            (PixelBuffer::F32(v), 3) => {
                DynamicImage::ImageRgb32F(ImageBuffer::from_raw(w, h, v.clone()).ok_or_else(unsupported)?)
            }
            (PixelBuffer::F32(v), 4) => {
                DynamicImage::ImageRgba32F(ImageBuffer::from_raw(w, h, v.clone()).ok_or_else(unsupported)?)
            }
            _ => return Err(unsupported()),
        };
        Ok(image)
    }
}

impl TryFrom<&DynamicImage> for Raster {
    type Error = PipelineError;

    fn try_from(image: &DynamicImage) -> Result<Self, Self::Error> {
        let (w, h) = (image.width(), image.height());
        let raster = match image {
            DynamicImage::ImageLuma8(b) => Raster::from_u8(w, h, 1, b.as_raw().clone()),
            DynamicImage::ImageLumaA8(b) => Raster::from_u8(w, h, 2, b.as_raw().clone()),
            DynamicImage::ImageRgb8(b) => Raster::from_u8(w, h, 3, b.as_raw().clone()),
            DynamicImage::ImageRgba8(b) => Raster::from_u8(w, h, 4, b.as_raw().clone()),
            DynamicImage::ImageLuma16(b) => Raster::from_u16(w, h, 1, b.as_raw().clone()),
            DynamicImage::ImageLumaA16(b) => Raster::from_u16(w, h, 2, b.as_raw().clone()),
            DynamicImage::ImageRgb16(b) => Raster::from_u16(w, h, 3, b.as_raw().clone()),
            DynamicImage::ImageRgba16(b) => Raster::from_u16(w, h, 4, b.as_raw().clone()),
            DynamicImage::ImageRgb32F(b) => Raster::from_f32(w, h, 3, b.as_raw().clone()),
            DynamicImage::ImageRgba32F(b) => Raster::from_f32(w, h, 4, b.as_raw().clone()),
            other => {
                return Err(PipelineError::UnsupportedLayout(format!(
                    "{:?}",
                    other.color()
                )))
            }
        };
        Ok(raster)
    }
}
