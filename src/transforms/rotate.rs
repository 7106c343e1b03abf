//! Quarter-turn rotation of a patch in one plane.

use ndarray::{Array3, Axis};

use crate::error::{Error, Result};

/// Rotate `patch` by `k * 90` degrees in the plane spanned by `axes`.
///
/// Odd `k` swaps the lengths of the two axes.
pub fn rotate_90(patch: &Array3<f32>, axes: (usize, usize), k: usize) -> Result<Array3<f32>> {
    if axes.0 >= 3 || axes.1 >= 3 {
        return Err(Error::InvalidDimensions(format!(
            "Rotation axes ({}, {}) out of bounds for 3D patch",
            axes.0, axes.1
        )));
    }

    if axes.0 == axes.1 {
        return Err(Error::InvalidDimensions(
            "Rotation axes must be different".into(),
        ));
    }

    let k = k % 4;
    let mut view = patch.view();
    for _ in 0..k {
        // swap + reverse is one quarter turn
        view.swap_axes(axes.0, axes.1);
        view.invert_axis(Axis(axes.1));
    }

    Ok(view.as_standard_layout().into_owned())
}

/// Number of quarter turns to actually apply so that a patch of `shape`
/// keeps its shape.
///
/// Odd turns swap the two axis lengths, so on a non-square plane they are
/// replaced by a half turn.
///
/// # Arguments
///
/// * `k` - Requested quarter turns
/// * `shape` - Shape of the patch being rotated
/// * `axes` - Rotation plane
///
/// # Example
///
/// ```
/// use vox2vec::transforms::shape_preserving_turns;
///
/// assert_eq!(shape_preserving_turns(3, &[8, 8, 4], (0, 1)), 3);
/// assert_eq!(shape_preserving_turns(3, &[8, 6, 4], (0, 1)), 2);
/// ```
pub fn shape_preserving_turns(k: usize, shape: &[usize], axes: (usize, usize)) -> usize {
    let k = k % 4;
    if k % 2 == 1 && shape.get(axes.0) != shape.get(axes.1) {
        2
    } else {
        k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(shape: (usize, usize, usize)) -> Array3<f32> {
        let n = shape.0 * shape.1 * shape.2;
        Array3::from_shape_vec(shape, (0..n).map(|i| i as f32).collect()).unwrap()
    }

    #[test]
    fn test_rotate_90_k0_is_identity() {
        let patch = numbered((2, 2, 2));
        assert_eq!(rotate_90(&patch, (0, 1), 0).unwrap(), patch);
        assert_eq!(rotate_90(&patch, (0, 1), 4).unwrap(), patch);
    }

    #[test]
    fn test_rotate_90_four_times_round_trips() {
        let patch = numbered((3, 3, 2));
        let mut out = patch.clone();
        for _ in 0..4 {
            out = rotate_90(&out, (0, 1), 1).unwrap();
        }
        assert_eq!(out, patch);
    }

    #[test]
    fn test_rotate_90_moves_values() {
        let patch = numbered((2, 2, 1));
        let rotated = rotate_90(&patch, (0, 1), 1).unwrap();
        assert_eq!(rotated.shape(), &[2, 2, 1]);
        assert_ne!(rotated, patch);
        let mut sorted: Vec<f32> = rotated.iter().copied().collect();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(sorted, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_rotate_90_invalid_axes() {
        let patch = numbered((2, 2, 2));
        assert!(rotate_90(&patch, (0, 5), 1).is_err());
        assert!(rotate_90(&patch, (1, 1), 1).is_err());
    }

    #[test]
    fn test_shape_preserving_turns_keep_shape_on_non_square_plane() {
        let patch = numbered((2, 3, 4));
        for k in 0..8 {
            let turns = shape_preserving_turns(k, patch.shape(), (0, 1));
            assert!(turns == 0 || turns == 2);
            let rotated = rotate_90(&patch, (0, 1), turns).unwrap();
            assert_eq!(rotated.shape(), &[2, 3, 4]);
        }
        assert_eq!(shape_preserving_turns(1, patch.shape(), (1, 2)), 2);
        assert_eq!(shape_preserving_turns(1, &[4, 4, 2], (0, 1)), 1);
        assert_eq!(shape_preserving_turns(5, &[4, 4, 2], (0, 1)), 1);
    }
}
