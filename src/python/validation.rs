//! Conversions and checks at the Python boundary.

use ndarray::{Array2, ArrayView2};
use pyo3::exceptions::{PyFileNotFoundError, PyIOError, PyIndexError, PyKeyError, PyValueError};

use crate::error::Error;
use crate::volume::Voxel;

/// Map a crate error to the matching Python exception.
pub fn to_py_err(e: Error, context: &str) -> pyo3::PyErr {
    match &e {
        Error::Io(io_err) => PyIOError::new_err(format!("{}: {}", context, io_err)),
        Error::MissingConfig(path) => PyFileNotFoundError::new_err(format!(
            "{}: config file not found: {}",
            context,
            path.display()
        )),
        Error::UnknownId(id) => PyKeyError::new_err(format!("{}: unknown scan {}", context, id)),
        Error::IndexOutOfRange { .. } => PyIndexError::new_err(format!("{}: {}", context, e)),
        Error::Configuration(msg) | Error::InvalidDimensions(msg) | Error::ShapeMismatch(msg) => {
            PyValueError::new_err(format!("{}: {}", context, msg))
        }
        Error::Json(_) | Error::EmptyOverlap { .. } | Error::Rejected { .. } => {
            PyValueError::new_err(format!("{}: {}", context, e))
        }
    }
}

/// Read an `(N, 3)` integer array as voxel coordinates.
pub fn parse_voxels(array: ArrayView2<'_, i64>, name: &str) -> pyo3::PyResult<Vec<Voxel>> {
    if array.ncols() != 3 {
        return Err(PyValueError::new_err(format!(
            "{} must have shape (N, 3) (got {:?})",
            name,
            array.shape()
        )));
    }
    Ok(array.rows().into_iter().map(|r| [r[0], r[1], r[2]]).collect())
}

/// Voxel coordinates as an `(N, 3)` array.
pub fn voxels_to_array(voxels: &[Voxel]) -> Array2<i64> {
    Array2::from_shape_fn((voxels.len(), 3), |(i, axis)| voxels[i][axis])
}

/// Validate a 3-element shape vector and return it as an array.
pub fn parse_shape3(values: &[usize], name: &str) -> pyo3::PyResult<[usize; 3]> {
    if values.len() != 3 {
        return Err(PyValueError::new_err(format!(
            "{} must be a 3-element sequence (got {})",
            name,
            values.len()
        )));
    }
    if let Some(i) = values.iter().position(|&d| d == 0) {
        return Err(PyValueError::new_err(format!(
            "{} dimension {} must be positive (got 0)",
            name, i
        )));
    }
    Ok([values[0], values[1], values[2]])
}
