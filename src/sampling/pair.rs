//! Two views around one anchor voxel, reduced to index-aligned voxels.

use ndarray::Array3;
use rand::Rng;

use super::bbox::BoxSampler;
use super::correspondence::{filter_pair, select};
use super::view::sample_view;
use crate::error::{Error, Result};
use crate::transforms::IntensityAugment;
use crate::volume::{Scan, Volume, Voxel};

/// A sampled pair of views.
#[derive(Debug, Clone)]
pub struct ViewPair {
    /// Augmented patch of the first view.
    pub patch_a: Array3<f32>,
    /// Augmented patch of the second view.
    pub patch_b: Array3<f32>,
    /// First view before the appearance transform, when one is configured.
    pub raw_a: Option<Array3<f32>>,
    /// Second view before the appearance transform, when one is configured.
    pub raw_b: Option<Array3<f32>>,
    /// Selected voxels in the first view's frame.
    pub voxels_a: Vec<Voxel>,
    /// The same voxels in the second view's frame.
    pub voxels_b: Vec<Voxel>,
    /// Anchor shared by both views, in volume coordinates.
    pub anchor: Voxel,
}

impl ViewPair {
    /// Number of corresponding voxels.
    pub fn len(&self) -> usize {
        self.voxels_a.len()
    }

    /// Whether the pair carries no voxels (never true for a sampled pair).
    pub fn is_empty(&self) -> bool {
        self.voxels_a.is_empty()
    }
}

struct AugmentedView {
    patch: Array3<f32>,
    raw: Option<Array3<f32>>,
    voxels: Vec<Voxel>,
}

fn augmented_view<R: Rng + ?Sized>(
    volume: &Volume,
    voxels: &[Voxel],
    anchor: &Voxel,
    patch_shape: [usize; 3],
    boxes: &BoxSampler,
    augment: &IntensityAugment,
    rng: &mut R,
) -> AugmentedView {
    let view = sample_view(volume, voxels, anchor, patch_shape, boxes, rng);
    let (patch, raw) = augment.apply_split(view.patch.view(), rng);
    AugmentedView {
        patch,
        raw: augment.appearance.is_some().then_some(raw),
        voxels: view.voxels,
    }
}

/// Sample one pair of views from `volume` around a random anchor in `voxels`.
///
/// Both views share the anchor but draw their boxes and augmentations
/// independently. The returned voxel lists are index-aligned, hold between
/// one and `max_count` voxels and always lie inside `patch_shape`.
///
/// # Arguments
///
/// * `volume` - Volume both views are cropped from
/// * `voxels` - Body voxels of `volume`; the anchor is drawn from these
/// * `patch_shape` - Shape of both patches
/// * `max_count` - Upper bound on corresponding voxels
/// * `boxes` - Rescale and rotation settings for each view
/// * `augment` - Intensity chain applied to each view
/// * `rng` - Random stream for every draw
///
/// # Example
///
/// ```ignore
/// let pair = sample_pair(&volume, &voxels, [32, 32, 32], 1024, &BoxSampler::new(), &augment, &mut rng)?;
/// assert_eq!(pair.voxels_a.len(), pair.voxels_b.len());
/// ```
///
/// # Panics
///
/// Panics if `voxels` is empty, a voxel lies outside the volume on the anchor
/// draw, or `patch_shape` does not fit the volume.
#[allow(clippy::too_many_arguments)]
pub fn sample_pair<R: Rng + ?Sized>(
    volume: &Volume,
    voxels: &[Voxel],
    patch_shape: [usize; 3],
    max_count: usize,
    boxes: &BoxSampler,
    augment: &IntensityAugment,
    rng: &mut R,
) -> Result<ViewPair> {
    assert!(!voxels.is_empty(), "cannot sample a pair from an empty voxel set");
    let anchor = voxels[rng.gen_range(0..voxels.len())];

    let a = augmented_view(volume, voxels, &anchor, patch_shape, boxes, augment, rng);
    let b = augmented_view(volume, voxels, &anchor, patch_shape, boxes, augment, rng);

    let indices = filter_pair(&a.voxels, &b.voxels, patch_shape, max_count, rng).inspect_err(
        |e| tracing::warn!(error = %e, ?anchor, "pair has no jointly valid voxels"),
    )?;

    Ok(ViewPair {
        patch_a: a.patch,
        patch_b: b.patch,
        raw_a: a.raw,
        raw_b: b.raw,
        voxels_a: select(&a.voxels, &indices),
        voxels_b: select(&b.voxels, &indices),
        anchor,
    })
}

/// Everything needed to draw pairs from a scan.
#[derive(Debug, Clone)]
pub struct PairSampler {
    /// Shape of every patch.
    pub patch_shape: [usize; 3],
    /// Upper bound on corresponding voxels per pair.
    pub max_num_voxels: usize,
    /// Spatial draw (rescale, rotation).
    pub boxes: BoxSampler,
    /// Intensity chain applied to each view.
    pub augment: IntensityAugment,
}

impl PairSampler {
    /// Sampler with plain crops and the given intensity chain.
    pub fn new(patch_shape: [usize; 3], max_num_voxels: usize, augment: IntensityAugment) -> Self {
        Self {
            patch_shape,
            max_num_voxels,
            boxes: BoxSampler::default(),
            augment,
        }
    }

    /// Replace the spatial draw.
    pub fn boxes(mut self, boxes: BoxSampler) -> Self {
        self.boxes = boxes;
        self
    }

    /// Check the sampler configuration.
    pub fn validate(&self) -> Result<()> {
        if self.patch_shape.iter().any(|&p| p == 0) {
            return Err(Error::Configuration(format!(
                "patch_size must be positive in every dimension (got {:?})",
                self.patch_shape
            )));
        }
        if self.max_num_voxels == 0 {
            return Err(Error::Configuration(
                "max_num_voxels_per_patch must be positive".to_string(),
            ));
        }
        self.boxes.validate()?;
        self.augment.validate()
    }

    /// Check that pairs can be drawn from `scan` without violating
    /// preconditions.
    pub fn check_scan(&self, scan: &Scan) -> Result<()> {
        let shape = scan.volume.shape();
        if (0..3).any(|i| self.patch_shape[i] > shape[i]) {
            return Err(Error::InvalidDimensions(format!(
                "patch_size {:?} exceeds volume shape {:?}",
                self.patch_shape, shape
            )));
        }
        if scan.body_voxels.is_empty() {
            return Err(Error::InvalidDimensions(
                "scan has no body voxels".to_string(),
            ));
        }
        Ok(())
    }

    /// Draw one pair from `scan`.
    pub fn sample<R: Rng + ?Sized>(&self, scan: &Scan, rng: &mut R) -> Result<ViewPair> {
        sample_pair(
            &scan.volume,
            &scan.body_voxels,
            self.patch_shape,
            self.max_num_voxels,
            &self.boxes,
            &self.augment,
            rng,
        )
    }
}
