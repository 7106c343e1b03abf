//! Cropping a volume to a box and moving voxel coordinates into the crop.

use ndarray::{s, Array3};
use rand::Rng;

use super::bbox::{Box3, BoxSampler};
use crate::transforms::{rotate_90, shape_preserving_turns};
use crate::volume::{Volume, Voxel};

/// Slice `volume` to `bbox`. Never interpolates.
///
/// # Panics
///
/// Panics if the box does not fit inside the volume.
pub fn extract(volume: &Volume, bbox: &Box3) -> Array3<f32> {
    assert!(
        bbox.fits_in(volume.shape()),
        "box {:?} does not fit volume of shape {:?}",
        bbox,
        volume.shape()
    );
    let [l0, l1, l2] = bbox.lower.map(|v| v as usize);
    let [u0, u1, u2] = bbox.upper.map(|v| v as usize);
    volume.view().slice(s![l0..u0, l1..u1, l2..u2]).to_owned()
}

/// Shift voxel coordinates into the frame of `bbox` (`v - bbox.lower`).
pub fn translate(voxels: &[Voxel], bbox: &Box3) -> Vec<Voxel> {
    voxels
        .iter()
        .map(|v| {
            [
                v[0] - bbox.lower[0],
                v[1] - bbox.lower[1],
                v[2] - bbox.lower[2],
            ]
        })
        .collect()
}

/// Mapping from volume coordinates to patch coordinates for one view.
///
/// A pure shift by the box origin when the box extent equals the patch
/// shape; otherwise the shifted coordinate is also scaled by
/// `patch / extent` and floored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewTransform {
    /// Box the view was cropped from.
    pub bbox: Box3,
    /// Shape of the resulting patch.
    pub patch_shape: [usize; 3],
}

impl ViewTransform {
    /// Transform for cropping `bbox` and resizing the crop to `patch_shape`.
    pub fn new(bbox: Box3, patch_shape: [usize; 3]) -> Self {
        Self { bbox, patch_shape }
    }

    /// Whether the crop needs resizing to reach the patch shape.
    pub fn is_rescaled(&self) -> bool {
        self.bbox.extent() != self.patch_shape
    }

    /// Map one volume coordinate into the patch frame.
    pub fn apply(&self, voxel: &Voxel) -> Voxel {
        let extent = self.bbox.extent();
        let mut out = [0i64; 3];
        for axis in 0..3 {
            let rel = voxel[axis] - self.bbox.lower[axis];
            out[axis] = if extent[axis] == self.patch_shape[axis] {
                rel
            } else {
                (rel * self.patch_shape[axis] as i64).div_euclid(extent[axis] as i64)
            };
        }
        out
    }

    /// Map a voxel set into the patch frame, preserving order.
    pub fn map_voxels(&self, voxels: &[Voxel]) -> Vec<Voxel> {
        if !self.is_rescaled() {
            return translate(voxels, &self.bbox);
        }
        voxels.iter().map(|v| self.apply(v)).collect()
    }

    /// Crop `volume` to the box and resize to the patch shape.
    ///
    /// Resizing picks the nearest source index `floor(dst * extent / patch)`
    /// on each axis.
    pub fn crop(&self, volume: &Volume) -> Array3<f32> {
        let cropped = extract(volume, &self.bbox);
        if !self.is_rescaled() {
            return cropped;
        }

        let extent = self.bbox.extent();
        let [p0, p1, p2] = self.patch_shape;
        let src_index =
            |dst: usize, axis: usize| dst * extent[axis] / self.patch_shape[axis];
        Array3::from_shape_fn((p0, p1, p2), |(i, j, k)| {
            cropped[[src_index(i, 0), src_index(j, 1), src_index(k, 2)]]
        })
    }
}

/// One geometric view: cropped patch plus voxel coordinates in its frame.
#[derive(Debug, Clone)]
pub struct GeometricView {
    /// Cropped (and possibly resized and rotated) patch.
    pub patch: Array3<f32>,
    /// Input voxels mapped into the patch frame, same order as the input.
    pub voxels: Vec<Voxel>,
    /// Transform used to build the view.
    pub transform: ViewTransform,
    /// Quarter turns applied to the patch.
    pub quarter_turns: usize,
}

/// Draw a box around `anchor`, crop it and map `voxels` into the crop.
///
/// Rotation, when drawn, is applied to the patch only; voxel coordinates are
/// shifted (and rescaled) but never rotated.
///
/// # Arguments
///
/// * `volume` - Volume to crop from
/// * `voxels` - Voxel set in volume coordinates; mapped in order
/// * `anchor` - Voxel the box must contain
/// * `patch_shape` - Shape of the returned patch
/// * `sampler` - Rescale and rotation settings
/// * `rng` - Random stream for the box, scale and rotation draws
///
/// # Panics
///
/// Panics under the preconditions of [`super::sample_box`], or if a rotation
/// is drawn and `sampler.rotate_axes` is not a valid plane (rejected by
/// [`BoxSampler::validate`]).
pub fn sample_view<R: Rng + ?Sized>(
    volume: &Volume,
    voxels: &[Voxel],
    anchor: &Voxel,
    patch_shape: [usize; 3],
    sampler: &BoxSampler,
    rng: &mut R,
) -> GeometricView {
    let bbox = sampler.sample(volume.shape(), patch_shape, anchor, rng);
    let transform = ViewTransform::new(bbox, patch_shape);
    let mut patch = transform.crop(volume);

    let quarter_turns = shape_preserving_turns(
        sampler.sample_quarter_turns(rng),
        &patch_shape,
        sampler.rotate_axes,
    );
    if quarter_turns > 0 {
        patch = rotate_90(&patch, sampler.rotate_axes, quarter_turns)
            .expect("rotate_axes must be two distinct axes in 0..3 (see BoxSampler::validate)");
    }

    GeometricView {
        patch,
        voxels: transform.map_voxels(voxels),
        transform,
        quarter_turns,
    }
}
