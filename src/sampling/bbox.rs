//! Random crop boxes that contain an anchor voxel.
//!
//! The box origin is drawn so that the anchor lands at a random offset inside
//! the box while the box stays inside the volume. Optional rescaling changes
//! the box extent; the extracted crop is later resized back to the patch
//! shape (see [`super::view`]).

use rand::Rng;

use crate::error::{Error, Result};
use crate::volume::{in_bounds, Voxel};

/// Axis-aligned box `[lower, upper)` in a volume's index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Box3 {
    /// Inclusive lower corner (the crop origin).
    pub lower: [i64; 3],
    /// Exclusive upper corner.
    pub upper: [i64; 3],
}

impl Box3 {
    /// Box with the given origin and extent.
    pub fn from_origin(lower: [i64; 3], extent: [usize; 3]) -> Self {
        let upper = [
            lower[0] + extent[0] as i64,
            lower[1] + extent[1] as i64,
            lower[2] + extent[2] as i64,
        ];
        Self { lower, upper }
    }

    /// Size of the box along each axis.
    pub fn extent(&self) -> [usize; 3] {
        [
            (self.upper[0] - self.lower[0]) as usize,
            (self.upper[1] - self.lower[1]) as usize,
            (self.upper[2] - self.lower[2]) as usize,
        ]
    }

    /// Whether `voxel` lies inside the box.
    pub fn contains(&self, voxel: &Voxel) -> bool {
        (0..3).all(|i| voxel[i] >= self.lower[i] && voxel[i] < self.upper[i])
    }

    /// Whether the box lies entirely within a volume of shape `shape`.
    pub fn fits_in(&self, shape: [usize; 3]) -> bool {
        (0..3).all(|i| {
            self.lower[i] >= 0 && self.lower[i] <= self.upper[i] && self.upper[i] <= shape[i] as i64
        })
    }
}

/// Sample a box of exactly `patch_shape` that contains `anchor`.
///
/// The origin on each axis is drawn uniformly from
/// `[max(0, anchor - patch + 1), min(volume - patch, anchor)]`, so the anchor
/// sits at a random offset inside the box.
///
/// # Arguments
///
/// * `volume_shape` - Shape of the volume being cropped
/// * `patch_shape` - Extent of the box
/// * `anchor` - Voxel the box must contain
/// * `rng` - Random stream for the origin
///
/// # Example
///
/// ```
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
/// use vox2vec::sample_box;
///
/// let mut rng = ChaCha8Rng::seed_from_u64(0);
/// let bbox = sample_box([64, 64, 64], [32, 32, 32], &[63, 0, 10], &mut rng);
/// assert_eq!(bbox.extent(), [32, 32, 32]);
/// assert_eq!(bbox.lower[0], 32);
/// assert_eq!(bbox.lower[1], 0);
/// assert!(bbox.contains(&[63, 0, 10]));
/// ```
///
/// # Panics
///
/// Panics if `anchor` is outside `volume_shape`, or if `patch_shape` is zero
/// or larger than `volume_shape` on some axis.
pub fn sample_box<R: Rng + ?Sized>(
    volume_shape: [usize; 3],
    patch_shape: [usize; 3],
    anchor: &Voxel,
    rng: &mut R,
) -> Box3 {
    place_box(volume_shape, patch_shape, anchor, rng)
}

fn place_box<R: Rng + ?Sized>(
    volume_shape: [usize; 3],
    extent: [usize; 3],
    anchor: &Voxel,
    rng: &mut R,
) -> Box3 {
    assert!(
        in_bounds(anchor, &volume_shape),
        "anchor {:?} lies outside volume of shape {:?}",
        anchor,
        volume_shape
    );

    let mut lower = [0i64; 3];
    for axis in 0..3 {
        let size = volume_shape[axis] as i64;
        let patch = extent[axis] as i64;
        assert!(
            patch > 0 && patch <= size,
            "box extent {:?} does not fit volume of shape {:?}",
            extent,
            volume_shape
        );

        // anchor - patch + 1 <= start <= anchor keeps the anchor inside
        let a = anchor[axis];
        let min_start = (a - patch + 1).max(0);
        let max_start = (size - patch).min(a);
        lower[axis] = rng.gen_range(min_start..=max_start);
    }

    Box3::from_origin(lower, extent)
}

/// Spatial part of a view draw: random rescale and optional rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSampler {
    /// Range of the random scale factor; `None` disables rescaling.
    pub scale_range: Option<(f32, f32)>,
    /// Draw one factor for all axes instead of one per axis.
    pub isotropic: bool,
    /// Probability of rotating the crop by a random multiple of 90 degrees.
    pub rotate_prob: f32,
    /// Plane of the rotation.
    pub rotate_axes: (usize, usize),
}

impl Default for BoxSampler {
    fn default() -> Self {
        Self {
            scale_range: None,
            isotropic: true,
            rotate_prob: 0.0,
            rotate_axes: (0, 1),
        }
    }
}

impl BoxSampler {
    /// Plain crops: no rescale, no rotation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable random rescaling with factors in `[min, max]`.
    pub fn scale(mut self, min: f32, max: f32) -> Self {
        self.scale_range = Some((min, max));
        self
    }

    /// Draw an independent scale factor per axis.
    pub fn anisotropic(mut self) -> Self {
        self.isotropic = false;
        self
    }

    /// Rotate crops in the `axes` plane with probability `prob`.
    pub fn rotate(mut self, prob: f32, axes: (usize, usize)) -> Self {
        self.rotate_prob = prob;
        self.rotate_axes = axes;
        self
    }

    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if let Some((min, max)) = self.scale_range {
            if !(min.is_finite() && max.is_finite()) || min <= 0.0 || min > max {
                return Err(Error::Configuration(format!(
                    "scale_range must satisfy 0 < min <= max (got ({}, {}))",
                    min, max
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.rotate_prob) {
            return Err(Error::Configuration(format!(
                "rotate_prob must be between 0.0 and 1.0 (got {})",
                self.rotate_prob
            )));
        }
        let (a, b) = self.rotate_axes;
        if a >= 3 || b >= 3 || a == b {
            return Err(Error::Configuration(format!(
                "rotate_axes must be two distinct axes in 0..3 (got ({}, {}))",
                a, b
            )));
        }
        Ok(())
    }

    /// Draw the box extent for one view.
    ///
    /// Equals `patch_shape` when rescaling is disabled; otherwise each axis
    /// is `round(patch * factor)` clamped to `[1, volume]`.
    pub fn sample_extent<R: Rng + ?Sized>(
        &self,
        volume_shape: [usize; 3],
        patch_shape: [usize; 3],
        rng: &mut R,
    ) -> [usize; 3] {
        let Some((min, max)) = self.scale_range else {
            return patch_shape;
        };

        let iso = rng.gen_range(min..=max);
        let mut extent = patch_shape;
        for axis in 0..3 {
            let factor = if self.isotropic {
                iso
            } else {
                rng.gen_range(min..=max)
            };
            let scaled = (patch_shape[axis] as f32 * factor).round() as usize;
            extent[axis] = scaled.clamp(1, volume_shape[axis].max(1));
        }
        extent
    }

    /// Draw a box containing `anchor` for one view.
    ///
    /// # Panics
    ///
    /// Same preconditions as [`sample_box`].
    pub fn sample<R: Rng + ?Sized>(
        &self,
        volume_shape: [usize; 3],
        patch_shape: [usize; 3],
        anchor: &Voxel,
        rng: &mut R,
    ) -> Box3 {
        let extent = self.sample_extent(volume_shape, patch_shape, rng);
        place_box(volume_shape, extent, anchor, rng)
    }

    /// Number of quarter turns to rotate the crop by (0 when not rotating).
    pub fn sample_quarter_turns<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        if self.rotate_prob > 0.0 && rng.gen::<f32>() < self.rotate_prob {
            rng.gen_range(1..4)
        } else {
            0
        }
    }
}
