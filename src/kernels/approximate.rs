//! Layered approximate convolution.
//!
//! Each mask plane is cut into `layers` equal-height slices between zero and
//! its largest magnitude. A coefficient keeps one slice per full layer it
//! reaches, so it is truncated toward zero. Every slice is a binary mask
//! whose rows decompose into horizontal runs ("lines"), and a line's
//! contribution is a difference of two prefix sums over the input row. Cost
//! is proportional to the number of distinct lines rather than to the mask
//! area.
//!
//! Runs on the same mask row and layer whose gap is smaller than `cluster`
//! cells are merged, filling the gap. That trades accuracy for fewer lines.
//!
//! Line weights are rescaled so the positive and the negative lobe of the
//! approximation each carry the same mass as in the original mask, which
//! keeps the brightness of flat regions.
//!
//! `layers` is an upper bound. A finer slicing is only used when it fits
//! every coefficient at least as closely as the best coarser one, so raising
//! `layers` never makes the approximation of any coefficient worse.

use crate::core::config::ApproximationParams;
use crate::core::error::KernelResult;
use crate::core::types::{PixelBuffer, Raster, Sample};
use crate::kernels::{clamp_coord, fill_rows, ApproximateKernel, Geometry};
use crate::mask::types::FloatMask;
use rayon::prelude::*;
use std::collections::BTreeMap;

/// Layered line-decomposition kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayeredApproxKernel;

impl ApproximateKernel for LayeredApproxKernel {
    fn run(
        &self,
        input: &Raster,
        mask: &FloatMask,
        params: &ApproximationParams,
    ) -> KernelResult<Raster> {
        let geometry = Geometry::check(input, mask.width(), mask.height(), mask.bands())?;
        let pixels = match input.pixels() {
            PixelBuffer::U8(src) => PixelBuffer::U8(approximate(src, &geometry, mask, params)?),
            PixelBuffer::U16(src) => PixelBuffer::U16(approximate(src, &geometry, mask, params)?),
            PixelBuffer::F32(src) => PixelBuffer::F32(approximate(src, &geometry, mask, params)?),
        };
        Ok(Raster::new(input.width(), input.height(), input.bands(), pixels))
    }
}

/// A weighted horizontal run `[start, end)` on one mask row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    /// Mask row
    pub row: usize,
    /// First column
    pub start: usize,
    /// One past the last column
    pub end: usize,
    /// Contribution of every cell in the run
    pub weight: f64,
}

/// Decompose one row-major mask plane into weighted lines.
///
/// Lines with identical extent are combined, so a flat region spanning many
/// layers costs a single prefix-sum difference.
pub fn decompose(plane: &[f64], width: usize, height: usize, layers: u32, cluster: u32) -> Vec<Line> {
    let max = peak(plane);
    if max == 0.0 || width == 0 {
        return Vec::new();
    }
    let used = refine(plane, max, layers);
    if used != layers {
        log::trace!("{} layers requested, {} fit best", layers, used);
    }
    let levels = quantize(plane, max, used);

    // Layer counts per extent, positive lobe first
    let mut combined: BTreeMap<(usize, usize, usize), [i64; 2]> = BTreeMap::new();
    for row in 0..height {
        let cells = &levels[row * width..(row + 1) * width];
        for (lobe, sign) in [(0usize, 1i64), (1, -1)] {
            let top = cells.iter().map(|&l| l * sign).max().unwrap_or(0);
            for layer in 1..=top {
                let runs = merge_runs(row_runs(cells, |l| l * sign >= layer), cluster as usize);
                for (start, end) in runs {
                    combined.entry((row, start, end)).or_insert([0, 0])[lobe] += 1;
                }
            }
        }
    }

    // Scale each lobe so its area matches the original
    let mut covered = [0.0f64; 2];
    for (&(_, start, end), counts) in &combined {
        for lobe in 0..2 {
            covered[lobe] += (counts[lobe] as usize * (end - start)) as f64;
        }
    }
    let targets = lobe_masses(plane);
    let gains = [0usize, 1].map(|lobe| {
        if covered[lobe] > 0.0 {
            targets[lobe] / covered[lobe]
        } else {
            0.0
        }
    });

    combined
        .into_iter()
        .map(|((row, start, end), [pos, neg])| Line {
            row,
            start,
            end,
            weight: pos as f64 * gains[0] - neg as f64 * gains[1],
        })
        .filter(|line| line.weight != 0.0)
        .collect()
}

/// Largest coefficient magnitude.
fn peak(plane: &[f64]) -> f64 {
    plane.iter().fold(0.0f64, |m, c| m.max(c.abs()))
}

/// Sum of the positive coefficients and magnitude of the negative ones.
fn lobe_masses(plane: &[f64]) -> [f64; 2] {
    plane.iter().fold([0.0, 0.0], |[pos, neg], &c| {
        if c > 0.0 {
            [pos + c, neg]
        } else {
            [pos, neg - c]
        }
    })
}

/// Signed count of layers reached by each coefficient.
fn quantize(plane: &[f64], max: f64, layers: u32) -> Vec<i64> {
    plane
        .iter()
        .map(|&c| {
            let level = if c.abs() == max {
                layers as i64
            } else {
                (c.abs() * layers as f64 / max).floor() as i64
            };
            if c < 0.0 {
                -level
            } else {
                level
            }
        })
        .collect()
}

/// Per-coefficient distance between the plane and its lobe-scaled
/// quantization at `layers`, before any run merging.
fn deviation(plane: &[f64], max: f64, layers: u32) -> Vec<f64> {
    let levels = quantize(plane, max, layers);
    let targets = lobe_masses(plane);
    let mut counted = [0.0f64; 2];
    for &level in &levels {
        if level > 0 {
            counted[0] += level as f64;
        } else {
            counted[1] -= level as f64;
        }
    }
    plane
        .iter()
        .zip(&levels)
        .map(|(&c, &level)| {
            let value = match level {
                l if l > 0 => l as f64 * (targets[0] / counted[0]),
                l if l < 0 => l as f64 * (targets[1] / counted[1]),
                _ => 0.0,
            };
            (c - value).abs()
        })
        .collect()
}

/// Layer count up to `layers` whose quantization fits best.
///
/// A candidate replaces the current choice only if no coefficient is
/// further from the mask and at least one is closer.
fn refine(plane: &[f64], max: f64, layers: u32) -> u32 {
    let mut chosen = 1;
    let mut best = deviation(plane, max, 1);
    for candidate in 2..=layers {
        let fit = deviation(plane, max, candidate);
        let no_worse = fit.iter().zip(&best).all(|(a, b)| a <= b);
        if no_worse && fit.iter().zip(&best).any(|(a, b)| a < b) {
            chosen = candidate;
            best = fit;
        }
    }
    chosen
}


fn row_runs(cells: &[i64], inside: impl Fn(i64) -> bool) -> Vec<(usize, usize)> {
    let mut runs = Vec::new();
    let mut start = None;
    for (x, &level) in cells.iter().enumerate() {
        match (inside(level), start) {
            (true, None) => start = Some(x),
            (false, Some(s)) => {
                runs.push((s, x));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push((s, cells.len()));
    }
    runs
}

fn merge_runs(runs: Vec<(usize, usize)>, cluster: usize) -> Vec<(usize, usize)> {
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(runs.len());
    for (start, end) in runs {
        match merged.last_mut() {
            Some(last) if start - last.1 < cluster => last.1 = end,
            _ => merged.push((start, end)),
        }
    }
    merged
}

fn approximate<S: Sample>(
    src: &[S],
    geometry: &Geometry,
    mask: &FloatMask,
    params: &ApproximationParams,
) -> KernelResult<Vec<S>> {
    let g = *geometry;
    let (ox, oy) = (mask.origin_x() as isize, mask.origin_y() as isize);
    let scale = mask.scale();
    let offset = mask.offset();
    let padded = g.width + g.mask_width - 1;

    let mut out = Vec::new();
    for band in 0..g.bands {
        let lines = decompose(
            mask.plane(band),
            g.mask_width,
            g.mask_height,
            params.layers(),
            params.cluster(),
        );
        log::trace!("band {}: {} lines", band, lines.len());

        // Prefix sums of every edge-extended input row for this band
        let prefix: Vec<Vec<f64>> = (0..g.height)
            .into_par_iter()
            .map(|y| {
                let mut sums = Vec::with_capacity(padded + 1);
                let mut total = 0.0f64;
                sums.push(total);
                for p in 0..padded {
                    let sx = clamp_coord(p as isize - ox, g.width);
                    total += src[(y * g.width + sx) * g.bands + band].to_f64();
                    sums.push(total);
                }
                sums
            })
            .collect();

        fill_rows(geometry, &mut out, |y, row| {
            for x in 0..g.width {
                let mut acc = 0.0f64;
                for line in &lines {
                    let sy = clamp_coord(y as isize + line.row as isize - oy, g.height);
                    let sums = &prefix[sy];
                    acc += line.weight * (sums[x + line.end] - sums[x + line.start]);
                }
                row[x * g.bands + band] = S::from_f64(acc / scale + offset);
            }
            Ok(())
        })?;
    }
    Ok(out)
}
