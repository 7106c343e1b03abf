//! Stacking independently sampled pairs into a batch.

use ndarray::{stack, Array3, Array5, ArrayView4, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use super::pair::{PairSampler, ViewPair};
use crate::error::{Error, Result};
use crate::volume::{Scan, Voxel};

/// A batch of view pairs from one scan.
///
/// Patch arrays are laid out `[batch, 1, d, h, w]`. Voxel lists are
/// index-aligned per pair and vary in length between pairs.
#[derive(Debug, Clone)]
pub struct PairBatch {
    /// Augmented first views.
    pub patches_a: Array5<f32>,
    /// Augmented second views.
    pub patches_b: Array5<f32>,
    /// First views before the appearance transform (MRI only).
    pub raw_patches_a: Option<Array5<f32>>,
    /// Second views before the appearance transform (MRI only).
    pub raw_patches_b: Option<Array5<f32>>,
    /// Corresponding voxels in each first view.
    pub voxels_a: Vec<Vec<Voxel>>,
    /// Corresponding voxels in each second view.
    pub voxels_b: Vec<Vec<Voxel>>,
}

fn stack_patches<'a>(patches: impl Iterator<Item = &'a Array3<f32>>) -> Result<Array5<f32>> {
    let views: Vec<ArrayView4<'_, f32>> = patches
        .map(|p| p.view().insert_axis(Axis(0)))
        .collect();
    stack(Axis(0), &views)
        .map_err(|e| Error::ShapeMismatch(format!("cannot stack patches: {}", e)))
}

fn stack_optional<'a>(
    patches: impl Iterator<Item = Option<&'a Array3<f32>>>,
) -> Result<Option<Array5<f32>>> {
    match patches.collect::<Option<Vec<_>>>() {
        Some(raw) => stack_patches(raw.into_iter()).map(Some),
        None => Ok(None),
    }
}

impl PairBatch {
    /// Stack sampled pairs.
    pub fn from_pairs(pairs: Vec<ViewPair>) -> Result<Self> {
        if pairs.is_empty() {
            return Err(Error::InvalidDimensions(
                "cannot build an empty batch".to_string(),
            ));
        }

        let patches_a = stack_patches(pairs.iter().map(|p| &p.patch_a))?;
        let patches_b = stack_patches(pairs.iter().map(|p| &p.patch_b))?;
        let raw_patches_a = stack_optional(pairs.iter().map(|p| p.raw_a.as_ref()))?;
        let raw_patches_b = stack_optional(pairs.iter().map(|p| p.raw_b.as_ref()))?;
        let (voxels_a, voxels_b) = pairs
            .into_iter()
            .map(|p| (p.voxels_a, p.voxels_b))
            .unzip();

        Ok(Self {
            patches_a,
            patches_b,
            raw_patches_a,
            raw_patches_b,
            voxels_a,
            voxels_b,
        })
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.voxels_a.len()
    }

    /// Whether the batch holds no pairs.
    pub fn is_empty(&self) -> bool {
        self.voxels_a.is_empty()
    }
}

/// Draw `batch_size` independent pairs from `scan`.
///
/// Each pair gets its own random stream seeded from `rng`, so pairs are
/// sampled in parallel and the batch is reproducible for a seeded `rng`.
/// The first failing pair aborts the batch.
pub fn sample_batch<R: Rng + ?Sized>(
    scan: &Scan,
    sampler: &PairSampler,
    batch_size: usize,
    rng: &mut R,
) -> Result<PairBatch> {
    if batch_size == 0 {
        return Err(Error::Configuration(
            "batch_size must be positive".to_string(),
        ));
    }

    let seeds: Vec<u64> = (0..batch_size).map(|_| rng.gen()).collect();
    let pairs = seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            sampler.sample(scan, &mut rng)
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!(
        batch_size,
        voxels = pairs.iter().map(ViewPair::len).sum::<usize>(),
        "sampled pair batch"
    );

    PairBatch::from_pairs(pairs)
}
