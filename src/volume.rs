//! Scan volumes and voxel coordinate sets.
//!
//! A [`Volume`] is an immutable 3D intensity array shared between every view
//! sampled from it. Voxel coordinates are signed so that coordinates shifted
//! into a patch frame can fall below zero before they are filtered.

use std::sync::Arc;

use ndarray::{Array3, ArrayView3};

use crate::error::{Error, Result};

/// Integer voxel coordinate `[i, j, k]` in some array's index space.
pub type Voxel = [i64; 3];

/// Immutable 3D intensity volume.
///
/// Cloning is cheap: the array is reference counted and never mutated.
#[derive(Debug, Clone)]
pub struct Volume {
    data: Arc<Array3<f32>>,
}

impl Volume {
    /// Wrap an owned array.
    pub fn new(data: Array3<f32>) -> Self {
        Self {
            data: Arc::new(data),
        }
    }

    /// Build a volume from C-ordered values.
    pub fn from_shape_vec(shape: [usize; 3], values: Vec<f32>) -> Result<Self> {
        let data = Array3::from_shape_vec(shape, values)
            .map_err(|e| Error::ShapeMismatch(format!("cannot build volume: {}", e)))?;
        Ok(Self::new(data))
    }

    /// Shape `[d, h, w]`.
    pub fn shape(&self) -> [usize; 3] {
        let (d, h, w) = self.data.dim();
        [d, h, w]
    }

    /// Borrow the intensity array.
    pub fn view(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// Whether `voxel` lies inside the volume on every axis.
    pub fn contains(&self, voxel: &Voxel) -> bool {
        in_bounds(voxel, &self.shape())
    }
}

impl From<Array3<f32>> for Volume {
    fn from(data: Array3<f32>) -> Self {
        Self::new(data)
    }
}

/// A volume together with its foreground ("body") voxel set.
///
/// This is what a [`crate::source::VolumeSource`] hands to the sampler. The
/// voxel set is ordered and shared; sampling only ever produces shifted or
/// filtered copies of it.
#[derive(Debug, Clone)]
pub struct Scan {
    /// Intensity volume.
    pub volume: Volume,
    /// Foreground voxel coordinates inside `volume`.
    pub body_voxels: Arc<[Voxel]>,
}

impl Scan {
    /// Pair a volume with its body voxels.
    ///
    /// Fails if any voxel lies outside the volume.
    pub fn new(volume: Volume, body_voxels: Vec<Voxel>) -> Result<Self> {
        if let Some(bad) = body_voxels.iter().find(|v| !volume.contains(v)) {
            return Err(Error::InvalidDimensions(format!(
                "body voxel {:?} lies outside volume of shape {:?}",
                bad,
                volume.shape()
            )));
        }
        Ok(Self {
            volume,
            body_voxels: body_voxels.into(),
        })
    }
}

/// Whether every component of `voxel` is in `[0, shape)`.
#[inline]
pub fn in_bounds(voxel: &Voxel, shape: &[usize; 3]) -> bool {
    voxel
        .iter()
        .zip(shape.iter())
        .all(|(&v, &s)| v >= 0 && v < s as i64)
}
