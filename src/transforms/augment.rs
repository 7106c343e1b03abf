//! Random intensity augmentations applied independently to each view.
//!
//! Every operation is a value transform: the output always has the shape of
//! the input, and the input is never modified.

use ndarray::{Array3, ArrayView3, Zip};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::appearance::AppearanceTransform;
use super::filters::{gaussian_filter, gaussian_sharpen};
use crate::error::{Error, Result};

/// Random number generator with optional seeding for reproducibility.
#[allow(clippy::option_if_let_else)] // match is clearer than map_or_else here
pub fn get_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(s) => ChaCha8Rng::seed_from_u64(s),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Add zero-mean Gaussian noise with standard deviation `std`.
///
/// Large patches are filled in parallel chunks, each with its own stream
/// seeded from `rng`, so the result only depends on the caller's stream.
///
/// # Arguments
///
/// * `patch` - Input patch
/// * `std` - Standard deviation of the noise; `<= 0` returns a copy
/// * `rng` - Random stream the chunk seeds are drawn from
///
/// # Example
///
/// ```ignore
/// let noisy = gaussian_noise(patch.view(), 30.0, &mut get_rng(Some(0)));
/// ```
#[must_use = "this function returns a new patch and does not modify the original"]
pub fn gaussian_noise<R: Rng + ?Sized>(patch: ArrayView3<'_, f32>, std: f32, rng: &mut R) -> Array3<f32> {
    const CHUNK_SIZE: usize = 8192;

    let base_seed: u64 = rng.gen();
    let mut output = patch.as_standard_layout().into_owned();
    if std <= 0.0 {
        return output;
    }

    let add_noise = |chunk_idx: usize, chunk: &mut [f32]| {
        let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(chunk_idx as u64));
        for v in chunk.iter_mut() {
            let u1: f32 = rng.gen::<f32>().max(1e-10);
            let u2: f32 = rng.gen();
            let noise = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f32::consts::PI * u2).cos() * std;
            *v += noise;
        }
    };

    if let Some(slice) = output.as_slice_mut() {
        if slice.len() > CHUNK_SIZE {
            slice
                .par_chunks_mut(CHUNK_SIZE)
                .enumerate()
                .for_each(|(i, chunk)| add_noise(i, chunk));
        } else {
            add_noise(0, slice);
        }
    }

    output
}

/// Clip to `window` and rescale it linearly to `[0, 1]`.
///
/// # Arguments
///
/// * `patch` - Input patch
/// * `window` - `(lower, upper)` intensity bounds, e.g. Hounsfield units
///
/// # Example
///
/// ```
/// use ndarray::Array3;
/// use vox2vec::transforms::scale_window;
///
/// let patch = Array3::from_shape_vec((1, 1, 3), vec![-2000.0, 0.0, 2000.0]).unwrap();
/// let scaled = scale_window(patch.view(), (-1000.0, 1000.0));
/// assert_eq!(scaled.as_slice().unwrap(), &[0.0, 0.5, 1.0]);
/// ```
#[must_use = "this function returns a new patch and does not modify the original"]
pub fn scale_window(patch: ArrayView3<'_, f32>, window: (f32, f32)) -> Array3<f32> {
    let (lo, hi) = window;
    let width = (hi - lo).max(f32::EPSILON);
    let mut output = Array3::zeros(patch.raw_dim());
    Zip::from(&mut output).and(&patch).par_for_each(|out, &v| {
        *out = (v.clamp(lo, hi) - lo) / width;
    });
    output
}

/// Intensity window and the ranges its random perturbation is drawn from.
///
/// A jittered window is `(U(max_window.0, min_window.0), U(min_window.1,
/// max_window.1))`: the lower bound moves between the widest and narrowest
/// allowed lower bound, and likewise for the upper bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Window used when no jitter is drawn.
    pub window: (f32, f32),
    /// Narrowest allowed window.
    pub min_window: (f32, f32),
    /// Widest allowed window.
    pub max_window: (f32, f32),
    /// Probability of drawing a jittered window.
    #[serde(default = "default_jitter_prob")]
    pub jitter_prob: f32,
}

fn default_jitter_prob() -> f32 {
    0.8
}

impl WindowConfig {
    /// Window with the default jitter probability.
    pub fn new(window: (f32, f32), min_window: (f32, f32), max_window: (f32, f32)) -> Self {
        Self {
            window,
            min_window,
            max_window,
            jitter_prob: default_jitter_prob(),
        }
    }

    /// Check that the window bounds nest and the probability is in range.
    pub fn validate(&self) -> Result<()> {
        let values = [
            self.window.0,
            self.window.1,
            self.min_window.0,
            self.min_window.1,
            self.max_window.0,
            self.max_window.1,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::Configuration(
                "window bounds must be finite".to_string(),
            ));
        }
        if self.window.0 >= self.window.1 {
            return Err(Error::Configuration(format!(
                "window lower bound must be below upper bound (got {:?})",
                self.window
            )));
        }
        if !(self.max_window.0 <= self.min_window.0
            && self.min_window.0 < self.min_window.1
            && self.min_window.1 <= self.max_window.1)
        {
            return Err(Error::Configuration(format!(
                "min_window {:?} must lie inside max_window {:?}",
                self.min_window, self.max_window
            )));
        }
        validate_probability(self.jitter_prob, "window.jitter_prob")
    }

    /// Draw the window for one view.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> (f32, f32) {
        if rng.gen::<f32>() < self.jitter_prob {
            (
                rng.gen_range(self.max_window.0..=self.min_window.0),
                rng.gen_range(self.min_window.1..=self.max_window.1),
            )
        } else {
            self.window
        }
    }
}

pub(crate) fn validate_probability(p: f32, name: &str) -> Result<()> {
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(Error::Configuration(format!(
            "{}: probability must be between 0.0 and 1.0 (got {})",
            name, p
        )));
    }
    Ok(())
}

fn validate_range(range: (f32, f32), name: &str) -> Result<()> {
    if !(range.0.is_finite() && range.1.is_finite()) || range.0 < 0.0 || range.0 > range.1 {
        return Err(Error::Configuration(format!(
            "{}: expected 0 <= min <= max (got {:?})",
            name, range
        )));
    }
    Ok(())
}

/// Configurable chain of random intensity perturbations.
///
/// Applied in order: blur or sharpen, additive noise, windowing, appearance
/// transform. Each stage can be disabled; disabled stages draw no random
/// numbers.
#[derive(Debug, Clone, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct IntensityAugment {
    /// Enable the blur/sharpen stage.
    pub enable_filter: bool,
    /// Probability that the blur/sharpen stage fires.
    pub filter_prob: f32,
    /// Given the stage fires, probability of blurring instead of sharpening.
    pub blur_prob: f32,
    /// Range of the blur sigma.
    pub blur_sigma: (f32, f32),
    /// Range of the first sharpening sigma.
    pub sharpen_sigma: (f32, f32),
    /// Second (fixed) sharpening sigma.
    pub sharpen_sigma_2: f32,
    /// Range of the sharpening amplification.
    pub sharpen_alpha: (f32, f32),
    /// Axes the filters run along (the axial plane by default).
    pub filter_axes: Vec<usize>,
    /// Enable additive Gaussian noise.
    pub enable_noise: bool,
    /// Probability that noise is added.
    pub noise_prob: f32,
    /// Noise standard deviation is drawn from `[0, noise_std_max]`.
    pub noise_std_max: f32,
    /// Intensity windowing; `None` leaves intensities unscaled.
    pub window: Option<WindowConfig>,
    /// Local appearance transform applied last.
    pub appearance: Option<AppearanceTransform>,
}

impl Default for IntensityAugment {
    fn default() -> Self {
        Self {
            enable_filter: true,
            filter_prob: 0.5,
            blur_prob: 0.5,
            blur_sigma: (0.25, 1.5),
            sharpen_sigma: (0.5, 1.0),
            sharpen_sigma_2: 0.5,
            sharpen_alpha: (10.0, 30.0),
            filter_axes: vec![0, 1],
            enable_noise: true,
            noise_prob: 0.5,
            noise_std_max: 0.1,
            window: None,
            appearance: None,
        }
    }
}

impl IntensityAugment {
    /// Default chain: blur/sharpen and noise, no windowing.
    pub fn new() -> Self {
        Self::default()
    }

    /// No-op chain.
    pub fn none() -> Self {
        Self {
            enable_filter: false,
            enable_noise: false,
            ..Self::default()
        }
    }

    /// CT chain: blur/sharpen, noise of up to 30 HU, jittered HU windowing.
    pub fn ct(window: WindowConfig) -> Self {
        Self {
            noise_std_max: 30.0,
            window: Some(window),
            ..Self::default()
        }
    }

    /// MRI chain: only the appearance transform.
    pub fn mri(appearance: AppearanceTransform) -> Self {
        Self {
            appearance: Some(appearance),
            ..Self::none()
        }
    }

    /// Disable the blur/sharpen stage.
    pub fn no_filter(mut self) -> Self {
        self.enable_filter = false;
        self
    }

    /// Disable additive noise.
    pub fn no_noise(mut self) -> Self {
        self.enable_noise = false;
        self
    }

    /// Set the noise standard deviation upper bound.
    pub fn noise_std_max(mut self, std: f32) -> Self {
        self.noise_std_max = std;
        self
    }

    /// Set the intensity window.
    pub fn window(mut self, window: WindowConfig) -> Self {
        self.window = Some(window);
        self
    }

    /// Set the appearance transform.
    pub fn appearance(mut self, appearance: AppearanceTransform) -> Self {
        self.appearance = Some(appearance);
        self
    }

    /// Check every probability and parameter range.
    pub fn validate(&self) -> Result<()> {
        validate_probability(self.filter_prob, "filter_prob")?;
        validate_probability(self.blur_prob, "blur_prob")?;
        validate_probability(self.noise_prob, "noise_prob")?;
        validate_range(self.blur_sigma, "blur_sigma")?;
        validate_range(self.sharpen_sigma, "sharpen_sigma")?;
        validate_range(self.sharpen_alpha, "sharpen_alpha")?;
        if !(self.sharpen_sigma_2.is_finite() && self.sharpen_sigma_2 >= 0.0) {
            return Err(Error::Configuration(format!(
                "sharpen_sigma_2 must be non-negative (got {})",
                self.sharpen_sigma_2
            )));
        }
        if !(self.noise_std_max.is_finite() && self.noise_std_max >= 0.0) {
            return Err(Error::Configuration(format!(
                "noise_std_max must be non-negative (got {})",
                self.noise_std_max
            )));
        }
        if let Some(axis) = self.filter_axes.iter().find(|&&a| a >= 3) {
            return Err(Error::Configuration(format!(
                "filter axis {} is out of range (must be 0, 1, or 2)",
                axis
            )));
        }
        if let Some(window) = &self.window {
            window.validate()?;
        }
        if let Some(appearance) = &self.appearance {
            appearance.validate()?;
        }
        Ok(())
    }

    /// Apply the chain to a copy of `patch`.
    #[must_use = "this function returns a new patch and does not modify the original"]
    pub fn apply<R: Rng + ?Sized>(&self, patch: ArrayView3<'_, f32>, rng: &mut R) -> Array3<f32> {
        self.apply_split(patch, rng).0
    }

    /// Apply the chain, also returning the patch as it was before the
    /// appearance transform.
    pub fn apply_split<R: Rng + ?Sized>(
        &self,
        patch: ArrayView3<'_, f32>,
        rng: &mut R,
    ) -> (Array3<f32>, Array3<f32>) {
        let mut image = patch.to_owned();

        if self.enable_filter && rng.gen::<f32>() < self.filter_prob {
            image = if rng.gen::<f32>() < self.blur_prob {
                let sigma = rng.gen_range(self.blur_sigma.0..=self.blur_sigma.1);
                gaussian_filter(image.view(), sigma, &self.filter_axes)
            } else {
                let sigma_1 = rng.gen_range(self.sharpen_sigma.0..=self.sharpen_sigma.1);
                let alpha = rng.gen_range(self.sharpen_alpha.0..=self.sharpen_alpha.1);
                gaussian_sharpen(
                    image.view(),
                    sigma_1,
                    self.sharpen_sigma_2,
                    alpha,
                    &self.filter_axes,
                )
            };
        }

        if self.enable_noise && rng.gen::<f32>() < self.noise_prob {
            let std = rng.gen_range(0.0..=self.noise_std_max);
            image = gaussian_noise(image.view(), std, rng);
        }

        if let Some(window) = &self.window {
            let bounds = window.sample(rng);
            image = scale_window(image.view(), bounds);
        }

        match &self.appearance {
            Some(appearance) => (appearance.apply(image.view(), rng), image),
            None => (image.clone(), image),
        }
    }
}
