//! Local appearance transforms: pixel shuffling, nonlinear intensity curves,
//! in-painting and out-painting.
//!
//! Intensity-dependent steps work on the patch's own min-max range, so the
//! transform behaves the same on raw MRI intensities and on windowed `[0, 1]`
//! CT patches.

use ndarray::{s, Array3, ArrayView3};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::augment::validate_probability;
use crate::error::{Error, Result};

const CURVE_SAMPLES: usize = 1000;
const PAINT_CONTINUE_PROB: f64 = 0.95;
const INPAINT_BLOCKS: usize = 5;
const OUTPAINT_EXTRA_BLOCKS: usize = 4;

/// Randomized local appearance transform with per-stage activation rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppearanceTransform {
    /// Probability of local pixel shuffling.
    pub local_rate: f32,
    /// Probability of the nonlinear intensity curve.
    pub nonlinear_rate: f32,
    /// Probability of painting (in- or out-).
    pub paint_rate: f32,
    /// Given painting, probability of in-painting instead of out-painting.
    pub inpaint_rate: f32,
    /// Number of blocks shuffled by local pixel shuffling.
    #[serde(default = "default_local_blocks")]
    pub local_blocks: usize,
}

fn default_local_blocks() -> usize {
    10_000
}

impl Default for AppearanceTransform {
    fn default() -> Self {
        Self::new(0.8, 0.9, 0.9, 0.2)
    }
}

impl AppearanceTransform {
    /// Transform with the given activation rates.
    pub fn new(local_rate: f32, nonlinear_rate: f32, paint_rate: f32, inpaint_rate: f32) -> Self {
        Self {
            local_rate,
            nonlinear_rate,
            paint_rate,
            inpaint_rate,
            local_blocks: default_local_blocks(),
        }
    }

    /// Set the number of shuffled blocks.
    pub fn local_blocks(mut self, blocks: usize) -> Self {
        self.local_blocks = blocks;
        self
    }

    /// Check that every rate is a probability.
    pub fn validate(&self) -> Result<()> {
        validate_probability(self.local_rate, "local_rate")?;
        validate_probability(self.nonlinear_rate, "nonlinear_rate")?;
        validate_probability(self.paint_rate, "paint_rate")?;
        validate_probability(self.inpaint_rate, "inpaint_rate")?;
        if self.local_blocks == 0 && self.local_rate > 0.0 {
            return Err(Error::Configuration(
                "local_blocks must be positive when local_rate > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply the transform to a copy of `patch`.
    #[must_use = "this function returns a new patch and does not modify the original"]
    pub fn apply<R: Rng + ?Sized>(&self, patch: ArrayView3<'_, f32>, rng: &mut R) -> Array3<f32> {
        let mut image = patch.to_owned();

        if rng.gen::<f32>() < self.local_rate {
            image = local_pixel_shuffling(image.view(), self.local_blocks, rng);
        }
        if rng.gen::<f32>() < self.nonlinear_rate {
            image = nonlinear_transformation(image.view(), rng);
        }
        if rng.gen::<f32>() < self.paint_rate {
            image = if rng.gen::<f32>() < self.inpaint_rate {
                in_painting(image.view(), rng)
            } else {
                out_painting(image.view(), rng)
            };
        }

        image
    }
}

fn intensity_range(patch: &ArrayView3<'_, f32>) -> (f32, f32) {
    patch.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
        (lo.min(v), hi.max(v))
    })
}

fn uniform_in<R: Rng + ?Sized>(lo: f32, hi: f32, rng: &mut R) -> f32 {
    if hi > lo {
        rng.gen_range(lo..hi)
    } else {
        lo
    }
}

/// Shuffle voxel values inside `blocks` random small blocks.
///
/// Block sides are drawn from `1..=max(1, n / 10)` per axis; values are
/// always read from the unshuffled input.
pub fn local_pixel_shuffling<R: Rng + ?Sized>(
    patch: ArrayView3<'_, f32>,
    blocks: usize,
    rng: &mut R,
) -> Array3<f32> {
    let mut output = patch.to_owned();
    let shape = patch.shape();
    if shape.iter().any(|&n| n == 0) {
        return output;
    }
    let mut window = Vec::new();

    for _ in 0..blocks {
        let mut start = [0usize; 3];
        let mut end = [0usize; 3];
        for axis in 0..3 {
            let n = shape[axis];
            let size = rng.gen_range(1..=(n / 10).max(1));
            start[axis] = rng.gen_range(0..=n - size);
            end[axis] = start[axis] + size;
        }
        let region = s![start[0]..end[0], start[1]..end[1], start[2]..end[2]];

        window.clear();
        window.extend(patch.slice(region).iter().copied());
        window.shuffle(rng);
        output
            .slice_mut(region)
            .iter_mut()
            .zip(window.iter())
            .for_each(|(out, &v)| *out = v);
    }

    output
}

fn cubic_bezier(p1: (f32, f32), p2: (f32, f32), t: f32) -> (f32, f32) {
    let u = 1.0 - t;
    let w1 = 3.0 * u * u * t;
    let w2 = 3.0 * u * t * t;
    let w3 = t * t * t;
    (w1 * p1.0 + w2 * p2.0 + w3, w1 * p1.1 + w2 * p2.1 + w3)
}

/// Piecewise-linear interpolation with clamping at both ends.
fn interp(x: f32, xs: &[f32], ys: &[f32]) -> f32 {
    let i = xs.partition_point(|&v| v <= x);
    if i == 0 {
        return ys[0];
    }
    if i == xs.len() {
        return ys[ys.len() - 1];
    }
    let (x0, x1) = (xs[i - 1], xs[i]);
    let (y0, y1) = (ys[i - 1], ys[i]);
    if x1 - x0 <= f32::EPSILON {
        return y0;
    }
    y0 + (x - x0) * (y1 - y0) / (x1 - x0)
}

/// Map intensities through a random cubic Bézier curve from (0, 0) to (1, 1).
///
/// With probability one half the curve is used as a monotone increasing map,
/// otherwise its sampled values are reversed, giving an inverted map.
pub fn nonlinear_transformation<R: Rng + ?Sized>(
    patch: ArrayView3<'_, f32>,
    rng: &mut R,
) -> Array3<f32> {
    let (lo, hi) = intensity_range(&patch);
    if !(hi - lo).is_finite() || hi - lo <= f32::EPSILON {
        return patch.to_owned();
    }

    let p1 = (rng.gen::<f32>(), rng.gen::<f32>());
    let p2 = (rng.gen::<f32>(), rng.gen::<f32>());
    let (mut xs, mut ys): (Vec<f32>, Vec<f32>) = (0..CURVE_SAMPLES)
        .map(|i| cubic_bezier(p1, p2, i as f32 / (CURVE_SAMPLES - 1) as f32))
        .unzip();

    xs.sort_by(f32::total_cmp);
    if rng.gen::<f32>() < 0.5 {
        ys.sort_by(f32::total_cmp);
    } else {
        ys.reverse();
    }

    let width = hi - lo;
    patch.mapv(|v| lo + interp((v - lo) / width, &xs, &ys) * width)
}

/// Draw `(start, size)` on one axis of length `n`.
///
/// The size is drawn from `[min_size, max_size]` and the block keeps a
/// three-voxel margin from the border when the axis is long enough.
fn random_block<R: Rng + ?Sized>(n: usize, min_size: usize, max_size: usize, rng: &mut R) -> (usize, usize) {
    let max_size = max_size.clamp(1, n);
    let min_size = min_size.clamp(1, max_size);
    let size = rng.gen_range(min_size..=max_size);
    let margin = 3;
    let start = if n >= size + 2 * margin {
        rng.gen_range(margin..=n - size - margin)
    } else {
        rng.gen_range(0..=n - size)
    };
    (start, size)
}

fn random_region<R: Rng + ?Sized>(
    shape: &[usize],
    sizes: impl Fn(usize) -> (usize, usize),
    rng: &mut R,
) -> ([usize; 3], [usize; 3]) {
    let mut start = [0usize; 3];
    let mut end = [0usize; 3];
    for axis in 0..3 {
        let (min_size, max_size) = sizes(shape[axis]);
        let (s, size) = random_block(shape[axis], min_size, max_size, rng);
        start[axis] = s;
        end[axis] = s + size;
    }
    (start, end)
}

/// Replace up to five random blocks with uniform noise in the patch range.
pub fn in_painting<R: Rng + ?Sized>(patch: ArrayView3<'_, f32>, rng: &mut R) -> Array3<f32> {
    let mut output = patch.to_owned();
    let shape = patch.shape().to_vec();
    if shape.iter().any(|&n| n == 0) {
        return output;
    }
    let (lo, hi) = intensity_range(&patch);

    let mut remaining = INPAINT_BLOCKS;
    while remaining > 0 && rng.gen_bool(PAINT_CONTINUE_PROB) {
        let (start, end) = random_region(&shape, |n| (n / 6, n / 3), rng);
        output
            .slice_mut(s![start[0]..end[0], start[1]..end[1], start[2]..end[2]])
            .iter_mut()
            .for_each(|v| *v = uniform_in(lo, hi, rng));
        remaining -= 1;
    }

    output
}

/// Replace the patch with uniform noise, keeping only a few random blocks of
/// the original content.
pub fn out_painting<R: Rng + ?Sized>(patch: ArrayView3<'_, f32>, rng: &mut R) -> Array3<f32> {
    let shape = patch.shape().to_vec();
    if shape.iter().any(|&n| n == 0) {
        return patch.to_owned();
    }
    let (lo, hi) = intensity_range(&patch);
    let mut output = patch.mapv(|_| uniform_in(lo, hi, rng));

    let block_sizes = |n: usize| (n - 4 * n / 7, n - 3 * n / 7);
    let keep = |output: &mut Array3<f32>, rng: &mut R| {
        let (start, end) = random_region(&shape, block_sizes, rng);
        let region = s![start[0]..end[0], start[1]..end[1], start[2]..end[2]];
        output.slice_mut(region).assign(&patch.slice(region));
    };

    keep(&mut output, rng);
    let mut remaining = OUTPAINT_EXTRA_BLOCKS;
    while remaining > 0 && rng.gen_bool(PAINT_CONTINUE_PROB) {
        keep(&mut output, rng);
        remaining -= 1;
    }

    output
}
