//! Selecting voxels that stay in bounds in both views of a pair.

use rand::Rng;

use crate::error::{Error, Result};
use crate::volume::{in_bounds, Voxel};

/// Per-voxel flag: all three components in `[0, patch_shape)`.
pub fn valid_mask(voxels: &[Voxel], patch_shape: &[usize; 3]) -> Vec<bool> {
    voxels.iter().map(|v| in_bounds(v, patch_shape)).collect()
}

/// Indices of voxels valid in both views, subsampled to at most `max_count`.
///
/// `voxels_a[i]` and `voxels_b[i]` must be the same original voxel mapped
/// into each view. When more than `max_count` indices are valid, exactly
/// `max_count` are drawn uniformly without replacement; either way the
/// returned indices are in ascending order.
///
/// Returns [`Error::EmptyOverlap`] when no index is valid in both views.
///
/// # Arguments
///
/// * `voxels_a` - Voxel set mapped into the first view
/// * `voxels_b` - The same voxels mapped into the second view
/// * `patch_shape` - Shape both views were cropped to
/// * `max_count` - Upper bound on returned indices
/// * `rng` - Random stream for the subsample
///
/// # Example
///
/// ```
/// use rand::SeedableRng;
/// use rand_chacha::ChaCha8Rng;
/// use vox2vec::filter_pair;
///
/// let a = vec![[0, 0, 0], [5, 0, 0], [1, 1, 1]];
/// let b = vec![[2, 2, 2], [1, 1, 1], [3, 3, 3]];
/// let mut rng = ChaCha8Rng::seed_from_u64(0);
/// let indices = filter_pair(&a, &b, [4, 4, 4], 10, &mut rng)?;
/// assert_eq!(indices, vec![0, 2]);
/// # Ok::<(), vox2vec::Error>(())
/// ```
///
/// # Panics
///
/// Panics if the two sets differ in length or `max_count` is zero.
pub fn filter_pair<R: Rng + ?Sized>(
    voxels_a: &[Voxel],
    voxels_b: &[Voxel],
    patch_shape: [usize; 3],
    max_count: usize,
    rng: &mut R,
) -> Result<Vec<usize>> {
    assert_eq!(
        voxels_a.len(),
        voxels_b.len(),
        "voxel sets of a pair must be index-aligned"
    );
    assert!(max_count > 0, "max_count must be positive");

    let mask_a = valid_mask(voxels_a, &patch_shape);
    let mask_b = valid_mask(voxels_b, &patch_shape);
    let valid: Vec<usize> = mask_a
        .iter()
        .zip(&mask_b)
        .enumerate()
        .filter(|(_, (&a, &b))| a && b)
        .map(|(i, _)| i)
        .collect();

    if valid.is_empty() {
        return Err(Error::EmptyOverlap {
            candidates: voxels_a.len(),
            patch_shape,
        });
    }

    if valid.len() <= max_count {
        return Ok(valid);
    }

    let mut picked: Vec<usize> = rand::seq::index::sample(rng, valid.len(), max_count)
        .into_iter()
        .map(|i| valid[i])
        .collect();
    picked.sort_unstable();
    Ok(picked)
}

/// Gather `voxels[i]` for each index.
pub fn select(voxels: &[Voxel], indices: &[usize]) -> Vec<Voxel> {
    indices.iter().map(|&i| voxels[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_valid_mask() {
        let voxels = vec![[0, 0, 0], [3, 3, 3], [4, 0, 0], [-1, 2, 2]];
        assert_eq!(valid_mask(&voxels, &[4, 4, 4]), vec![true, true, false, false]);
    }

    #[test]
    fn test_joint_validity_is_and_of_masks() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let a = vec![[0, 0, 0], [1, 1, 1], [-1, 0, 0], [2, 2, 2]];
        let b = vec![[0, 0, 0], [5, 1, 1], [0, 0, 0], [1, 1, 1]];
        let picked = filter_pair(&a, &b, [4, 4, 4], 10, &mut rng).unwrap();
        assert_eq!(picked, vec![0, 3]);
    }

    #[test]
    fn test_filter_matches_combined_masks() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let a: Vec<Voxel> = (0..60).map(|i| [i % 7 - 1, i % 5, (i / 3) % 6]).collect();
        let b: Vec<Voxel> = (0..60).map(|i| [i % 4, i % 6 - 1, i % 9]).collect();
        let (ma, mb) = (valid_mask(&a, &[5, 5, 5]), valid_mask(&b, &[5, 5, 5]));
        let expected: Vec<usize> = (0..60).filter(|&i| ma[i] && mb[i]).collect();
        assert!(!expected.is_empty());
        let picked = filter_pair(&a, &b, [5, 5, 5], 60, &mut rng).unwrap();
        assert_eq!(picked, expected);
    }

    #[test]
    fn test_subsample_exact_count_without_duplicates() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let a: Vec<Voxel> = (0..100).map(|i| [i % 8, (i / 8) % 8, 0]).collect();
        let b = a.clone();
        let picked = filter_pair(&a, &b, [8, 8, 8], 10, &mut rng).unwrap();
        assert_eq!(picked.len(), 10);
        let mut dedup = picked.clone();
        dedup.dedup();
        assert_eq!(dedup, picked);
        assert!(picked.windows(2).all(|w| w[0] < w[1]));
        for &i in &picked {
            assert!(i < 100);
            assert!(in_bounds(&a[i], &[8, 8, 8]));
        }
    }

    #[test]
    fn test_under_budget_returns_all_valid_in_order() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let a = vec![[9, 9, 9], [1, 1, 1], [2, 2, 2], [3, 3, 3]];
        let picked = filter_pair(&a, &a, [4, 4, 4], 3, &mut rng).unwrap();
        assert_eq!(picked, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_overlap_is_error() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let a = vec![[0, 0, 0]];
        let b = vec![[4, 0, 0]];
        let err = filter_pair(&a, &b, [4, 4, 4], 5, &mut rng).unwrap_err();
        assert!(matches!(err, Error::EmptyOverlap { candidates: 1, .. }));
    }

    #[test]
    #[should_panic(expected = "index-aligned")]
    fn test_length_mismatch_panics() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let _ = filter_pair(&[[0, 0, 0]], &[], [4, 4, 4], 5, &mut rng);
    }

    #[test]
    fn test_select() {
        let voxels = vec![[1, 0, 0], [2, 0, 0], [3, 0, 0]];
        assert_eq!(select(&voxels, &[0, 2]), vec![[1, 0, 0], [3, 0, 0]]);
    }
}
