//! Turning a raw volume into a [`Scan`]: body mask, body voxels and the
//! filters that reject scans pairs cannot be drawn from.

use ndarray::{Array2, Array3, ArrayViewMut2, Axis, Zip};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::sampling::{extract, Box3};
use crate::volume::{Scan, Volume, Voxel};

/// Body threshold for CT, in Hounsfield units.
pub const BODY_THRESHOLD_HU: f32 = -500.0;

/// Default body threshold for MRI intensities.
pub const BODY_THRESHOLD_MRI: f32 = 20.0;

/// How a raw volume is reduced to a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Preprocessing {
    /// Voxels at or above this intensity seed the body mask.
    pub body_threshold: f32,
    /// Crop the volume to the bounding box of the thresholded region first.
    pub crop_to_body: bool,
}

impl Preprocessing {
    /// CT: crop to the body and threshold at -500 HU.
    pub fn ct() -> Self {
        Self {
            body_threshold: BODY_THRESHOLD_HU,
            crop_to_body: true,
        }
    }

    /// MRI: threshold only.
    pub fn mri() -> Self {
        Self {
            body_threshold: BODY_THRESHOLD_MRI,
            crop_to_body: false,
        }
    }
}

fn fill_holes_2d(mut slice: ArrayViewMut2<'_, bool>) {
    let (h, w) = slice.dim();
    if h == 0 || w == 0 {
        return;
    }

    // background reachable from the slice border
    let mut outside = Array2::from_elem((h, w), false);
    let mut stack: Vec<(usize, usize)> = Vec::new();
    for i in 0..h {
        stack.push((i, 0));
        stack.push((i, w - 1));
    }
    for j in 0..w {
        stack.push((0, j));
        stack.push((h - 1, j));
    }

    while let Some((i, j)) = stack.pop() {
        if outside[[i, j]] || slice[[i, j]] {
            continue;
        }
        outside[[i, j]] = true;
        if i > 0 {
            stack.push((i - 1, j));
        }
        if i + 1 < h {
            stack.push((i + 1, j));
        }
        if j > 0 {
            stack.push((i, j - 1));
        }
        if j + 1 < w {
            stack.push((i, j + 1));
        }
    }

    Zip::from(&mut slice).and(&outside).for_each(|m, &out| {
        if !out {
            *m = true;
        }
    });
}

/// Threshold `volume` and fill holes in every axial slice.
///
/// Slices are taken along the last axis; a hole is any background region of a
/// slice not 4-connected to the slice border.
pub fn body_mask(volume: &Volume, threshold: f32) -> Array3<bool> {
    let mut mask = volume.view().mapv(|v| v >= threshold);
    mask.axis_iter_mut(Axis(2))
        .into_par_iter()
        .for_each(fill_holes_2d);
    mask
}

/// Coordinates of every set voxel, in C order.
pub fn body_voxels(mask: &Array3<bool>) -> Vec<Voxel> {
    mask.indexed_iter()
        .filter(|(_, &m)| m)
        .map(|((i, j, k), _)| [i as i64, j as i64, k as i64])
        .collect()
}

/// Tight bounding box of the set voxels, or `None` for an empty mask.
pub fn mask_bbox(mask: &Array3<bool>) -> Option<Box3> {
    let mut lower = [i64::MAX; 3];
    let mut upper = [i64::MIN; 3];
    for ((i, j, k), _) in mask.indexed_iter().filter(|(_, &m)| m) {
        for (axis, v) in [i, j, k].into_iter().enumerate() {
            lower[axis] = lower[axis].min(v as i64);
            upper[axis] = upper[axis].max(v as i64 + 1);
        }
    }
    (lower[0] != i64::MAX).then_some(Box3 { lower, upper })
}

/// Copy of `volume` restricted to `bbox`.
pub fn crop_to_box(volume: &Volume, bbox: &Box3) -> Volume {
    Volume::new(extract(volume, bbox))
}

/// Build a scan from a raw volume, or explain why it cannot be used.
///
/// Rejects volumes with no voxel above the threshold, volumes smaller than
/// `patch_shape` on some axis (after cropping), and empty body masks.
pub fn prepare_scan(
    id: &str,
    volume: Volume,
    preprocessing: &Preprocessing,
    patch_shape: [usize; 3],
) -> Result<Scan> {
    let reject = |reason: String| {
        tracing::debug!(id, %reason, "skipping scan");
        Error::Rejected {
            id: id.to_string(),
            reason,
        }
    };

    let volume = if preprocessing.crop_to_body {
        let foreground = volume.view().mapv(|v| v >= preprocessing.body_threshold);
        let bbox = mask_bbox(&foreground)
            .ok_or_else(|| reject("no voxel above the body threshold".to_string()))?;
        crop_to_box(&volume, &bbox)
    } else {
        volume
    };

    let shape = volume.shape();
    if (0..3).any(|i| shape[i] < patch_shape[i]) {
        return Err(reject(format!(
            "shape {:?} is smaller than patch {:?}",
            shape, patch_shape
        )));
    }

    let mask = body_mask(&volume, preprocessing.body_threshold);
    let voxels = body_voxels(&mask);
    if voxels.is_empty() {
        return Err(reject("empty body mask".to_string()));
    }

    tracing::debug!(id, ?shape, body_voxels = voxels.len(), "prepared scan");
    Scan::new(volume, voxels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring_volume() -> Volume {
        // hollow square ring in every axial slice, background -1000
        Volume::new(Array3::from_shape_fn((9, 9, 4), |(i, j, _)| {
            let on_ring = (2..=6).contains(&i)
                && (2..=6).contains(&j)
                && (i == 2 || i == 6 || j == 2 || j == 6);
            if on_ring {
                40.0
            } else {
                -1000.0
            }
        }))
    }

    #[test]
    fn test_body_mask_fills_holes() {
        let mask = body_mask(&ring_volume(), BODY_THRESHOLD_HU);
        assert!(mask[[4, 4, 0]]);
        assert!(mask[[2, 2, 3]]);
        assert!(!mask[[0, 0, 0]]);
        assert!(!mask[[8, 4, 1]]);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 25 * 4);
    }

    #[test]
    fn test_open_region_is_not_filled() {
        let mut data = Array3::from_elem((5, 5, 1), 0.0f32);
        data[[1, 1, 0]] = 100.0;
        let mask = body_mask(&Volume::new(data), 50.0);
        assert_eq!(mask.iter().filter(|&&m| m).count(), 1);
    }

    #[test]
    fn test_body_voxels_c_order() {
        let mut mask = Array3::from_elem((2, 2, 2), false);
        mask[[1, 0, 1]] = true;
        mask[[0, 1, 0]] = true;
        assert_eq!(body_voxels(&mask), vec![[0, 1, 0], [1, 0, 1]]);
    }

    #[test]
    fn test_mask_bbox() {
        let mask = body_mask(&ring_volume(), BODY_THRESHOLD_HU);
        let bbox = mask_bbox(&mask).unwrap();
        assert_eq!(bbox.lower, [2, 2, 0]);
        assert_eq!(bbox.upper, [7, 7, 4]);
        assert!(mask_bbox(&Array3::from_elem((2, 2, 2), false)).is_none());
    }

    #[test]
    fn test_prepare_scan_ct_crops_to_body() {
        let scan = prepare_scan("ring", ring_volume(), &Preprocessing::ct(), [4, 4, 4]).unwrap();
        assert_eq!(scan.volume.shape(), [5, 5, 4]);
        assert_eq!(scan.body_voxels.len(), 100);
    }

    #[test]
    fn test_prepare_scan_rejects_small_and_empty() {
        let err = prepare_scan("ring", ring_volume(), &Preprocessing::ct(), [6, 4, 4]).unwrap_err();
        assert!(matches!(err, Error::Rejected { .. }));

        let air = Volume::new(Array3::from_elem((8, 8, 8), -1000.0));
        assert!(prepare_scan("air", air, &Preprocessing::ct(), [4, 4, 4]).is_err());
        let dark = Volume::new(Array3::from_elem((8, 8, 8), 0.0));
        assert!(prepare_scan("dark", dark, &Preprocessing::mri(), [4, 4, 4]).is_err());
    }
}
