//! Exact convolution kernels.
//!
//! Integer masks on integer images are evaluated entirely in `i64`, so the
//! result is bit-exact. Float images and float masks accumulate in `f64`.

use crate::core::error::{KernelError, KernelResult};
use crate::core::types::{PixelBuffer, Raster, Sample};
use crate::kernels::{clamp_coord, fill_rows, FloatKernel, Geometry, IntegerKernel};
use crate::mask::converter::div_round;
use crate::mask::types::{Coefficient, FloatMask, IntMask, Mask};

/// Exact integer-mask kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactIntegerKernel;

impl IntegerKernel for ExactIntegerKernel {
    fn run(&self, input: &Raster, mask: &IntMask) -> KernelResult<Raster> {
        let geometry = Geometry::check(input, mask.width(), mask.height(), mask.bands())?;
        let pixels = match input.pixels() {
            PixelBuffer::U8(src) => PixelBuffer::U8(integer_exact(src, &geometry, mask)?),
            PixelBuffer::U16(src) => PixelBuffer::U16(integer_exact(src, &geometry, mask)?),
            // Float samples cannot be accumulated exactly in integers
            PixelBuffer::F32(src) => PixelBuffer::F32(real_exact(src, &geometry, mask, |c| c as f64)?),
        };
        Ok(Raster::new(input.width(), input.height(), input.bands(), pixels))
    }
}

/// Exact float-mask kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactFloatKernel;

impl FloatKernel for ExactFloatKernel {
    fn run(&self, input: &Raster, mask: &FloatMask) -> KernelResult<Raster> {
        let geometry = Geometry::check(input, mask.width(), mask.height(), mask.bands())?;
        let pixels = match input.pixels() {
            PixelBuffer::U8(src) => PixelBuffer::U8(real_exact(src, &geometry, mask, |c| c)?),
            PixelBuffer::U16(src) => PixelBuffer::U16(real_exact(src, &geometry, mask, |c| c)?),
            PixelBuffer::F32(src) => PixelBuffer::F32(real_exact(src, &geometry, mask, |c| c)?),
        };
        Ok(Raster::new(input.width(), input.height(), input.bands(), pixels))
    }
}

fn overflow() -> KernelError {
    KernelError::Failed("integer accumulator overflow".to_string())
}

fn integer_exact<S: Sample>(src: &[S], geometry: &Geometry, mask: &IntMask) -> KernelResult<Vec<S>> {
    let (ox, oy) = (mask.origin_x() as isize, mask.origin_y() as isize);
    let scale = mask.scale() as i64;
    let offset = mask.offset() as i64;
    let g = *geometry;

    let mut out = Vec::new();
    fill_rows(geometry, &mut out, |y, row| {
        for x in 0..g.width {
            for band in 0..g.bands {
                let plane = mask.plane(band);
                let mut acc: i64 = 0;
                for my in 0..g.mask_height {
                    let sy = clamp_coord(y as isize + my as isize - oy, g.height);
                    let line = &plane[my * g.mask_width..(my + 1) * g.mask_width];
                    for (mx, &c) in line.iter().enumerate() {
                        if c == 0 {
                            continue;
                        }
                        let sx = clamp_coord(x as isize + mx as isize - ox, g.width);
                        let sample = src[(sy * g.width + sx) * g.bands + band].to_i64();
                        acc = (c as i64)
                            .checked_mul(sample)
                            .and_then(|term| acc.checked_add(term))
                            .ok_or_else(overflow)?;
                    }
                }
                let value = div_round(acc, scale).checked_add(offset).ok_or_else(overflow)?;
                row[x * g.bands + band] = S::from_i64(value);
            }
        }
        Ok(())
    })?;
    Ok(out)
}

fn real_exact<S, T, F>(src: &[S], geometry: &Geometry, mask: &Mask<T>, widen: F) -> KernelResult<Vec<S>>
where
    S: Sample,
    T: Coefficient,
    F: Fn(T) -> f64 + Sync + Send,
{
    let (ox, oy) = (mask.origin_x() as isize, mask.origin_y() as isize);
    let scale = widen(mask.scale());
    let offset = widen(mask.offset());
    let g = *geometry;

    let mut out = Vec::new();
    fill_rows(geometry, &mut out, |y, row| {
        for x in 0..g.width {
            for band in 0..g.bands {
                let plane = mask.plane(band);
                let mut acc = 0.0f64;
                for my in 0..g.mask_height {
                    let sy = clamp_coord(y as isize + my as isize - oy, g.height);
                    let line = &plane[my * g.mask_width..(my + 1) * g.mask_width];
                    for (mx, &c) in line.iter().enumerate() {
                        if c == T::ZERO {
                            continue;
                        }
                        let sx = clamp_coord(x as isize + mx as isize - ox, g.width);
                        acc += widen(c) * src[(sy * g.width + sx) * g.bands + band].to_f64();
                    }
                }
                row[x * g.bands + band] = S::from_f64(acc / scale + offset);
            }
        }
        Ok(())
    })?;
    Ok(out)
}
