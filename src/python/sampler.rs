//! Pair sampling from numpy volumes.
//!
//! Pair outputs follow the modality: MRI returns
//! `(patch_a, patch_b, raw_a, raw_b, voxels_a, voxels_b)`, CT returns
//! `(patch_a, patch_b, voxels_a, voxels_b)`.

use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2, PyReadonlyArray3};
use pyo3::prelude::*;
use pyo3::types::{PyList, PyTuple};

use super::validation::{parse_shape3, parse_voxels, to_py_err, voxels_to_array};
use crate::config::DatasetConfig;
use crate::preprocess;
use crate::sampling::{self, PairBatch, PairSampler, ViewPair};
use crate::transforms::get_rng;
use crate::volume::{Scan, Volume, Voxel};

fn scan_from_numpy(
    volume: PyReadonlyArray3<'_, f32>,
    voxels: PyReadonlyArray2<'_, i64>,
) -> PyResult<Scan> {
    let voxels = parse_voxels(voxels.as_array(), "voxels")?;
    let volume = Volume::new(volume.as_array().to_owned());
    Scan::new(volume, voxels).map_err(|e| to_py_err(e, "PairSampler"))
}

fn pair_to_tuple<'py>(py: Python<'py>, pair: ViewPair) -> PyResult<Bound<'py, PyTuple>> {
    let mut items: Vec<Bound<'py, PyAny>> = vec![
        pair.patch_a.into_pyarray(py).into_any(),
        pair.patch_b.into_pyarray(py).into_any(),
    ];
    if let (Some(raw_a), Some(raw_b)) = (pair.raw_a, pair.raw_b) {
        items.push(raw_a.into_pyarray(py).into_any());
        items.push(raw_b.into_pyarray(py).into_any());
    }
    items.push(voxels_to_array(&pair.voxels_a).into_pyarray(py).into_any());
    items.push(voxels_to_array(&pair.voxels_b).into_pyarray(py).into_any());
    PyTuple::new(py, items)
}

fn batch_to_tuple<'py>(py: Python<'py>, batch: PairBatch) -> PyResult<Bound<'py, PyTuple>> {
    let voxel_list = |voxels: &[Vec<Voxel>]| {
        PyList::new(
            py,
            voxels.iter().map(|v| voxels_to_array(v).into_pyarray(py)),
        )
    };

    let mut items: Vec<Bound<'py, PyAny>> = vec![
        batch.patches_a.into_pyarray(py).into_any(),
        batch.patches_b.into_pyarray(py).into_any(),
    ];
    if let (Some(raw_a), Some(raw_b)) = (batch.raw_patches_a, batch.raw_patches_b) {
        items.push(raw_a.into_pyarray(py).into_any());
        items.push(raw_b.into_pyarray(py).into_any());
    }
    items.push(voxel_list(&batch.voxels_a)?.into_any());
    items.push(voxel_list(&batch.voxels_b)?.into_any());
    PyTuple::new(py, items)
}

/// Draws pairs of overlapping views from a volume and its body voxels.
///
/// Args:
///     config_json: Dataset configuration as a JSON string
///
/// Example:
///     >>> sampler = vox2vec.PairSampler(open("ct.json").read())
///     >>> patch_a, patch_b, vox_a, vox_b = sampler.sample_pair(volume, voxels, seed=0)
#[pyclass(name = "PairSampler", frozen)]
pub struct PyPairSampler {
    sampler: PairSampler,
    batch_size: usize,
}

#[pymethods]
impl PyPairSampler {
    #[new]
    fn new(config_json: &str) -> PyResult<Self> {
        let config =
            DatasetConfig::from_json_str(config_json).map_err(|e| to_py_err(e, "PairSampler"))?;
        Ok(Self {
            sampler: config.sampler(),
            batch_size: config.batch_size,
        })
    }

    /// Patch shape of every view.
    #[getter]
    fn patch_size(&self) -> [usize; 3] {
        self.sampler.patch_shape
    }

    /// Sample one pair.
    ///
    /// Args:
    ///     volume: float32 array of shape (D, H, W)
    ///     voxels: int64 array of shape (N, 3), body voxels of `volume`
    ///     seed: Optional random seed for reproducibility
    #[pyo3(signature = (volume, voxels, seed=None))]
    fn sample_pair<'py>(
        &self,
        py: Python<'py>,
        volume: PyReadonlyArray3<'py, f32>,
        voxels: PyReadonlyArray2<'py, i64>,
        seed: Option<u64>,
    ) -> PyResult<Bound<'py, PyTuple>> {
        let scan = scan_from_numpy(volume, voxels)?;
        self.sampler
            .check_scan(&scan)
            .map_err(|e| to_py_err(e, "sample_pair"))?;
        let pair = py
            .allow_threads(|| self.sampler.sample(&scan, &mut get_rng(seed)))
            .map_err(|e| to_py_err(e, "sample_pair"))?;
        pair_to_tuple(py, pair)
    }

    /// Sample a batch of pairs; patches are stacked to (B, 1, D, H, W) and
    /// voxels are returned as lists of (N_i, 3) arrays.
    #[pyo3(signature = (volume, voxels, batch_size=None, seed=None))]
    fn sample_batch<'py>(
        &self,
        py: Python<'py>,
        volume: PyReadonlyArray3<'py, f32>,
        voxels: PyReadonlyArray2<'py, i64>,
        batch_size: Option<usize>,
        seed: Option<u64>,
    ) -> PyResult<Bound<'py, PyTuple>> {
        let scan = scan_from_numpy(volume, voxels)?;
        self.sampler
            .check_scan(&scan)
            .map_err(|e| to_py_err(e, "sample_batch"))?;
        let batch_size = batch_size.unwrap_or(self.batch_size);
        let batch = py
            .allow_threads(|| {
                sampling::sample_batch(&scan, &self.sampler, batch_size, &mut get_rng(seed))
            })
            .map_err(|e| to_py_err(e, "sample_batch"))?;
        batch_to_tuple(py, batch)
    }
}

/// Body voxels of a volume: threshold, fill holes per axial slice, argwhere.
#[pyfunction]
#[pyo3(signature = (volume, threshold))]
pub fn body_voxels<'py>(
    py: Python<'py>,
    volume: PyReadonlyArray3<'py, f32>,
    threshold: f32,
) -> Bound<'py, PyArray2<i64>> {
    let volume = Volume::new(volume.as_array().to_owned());
    let voxels = py.allow_threads(|| {
        preprocess::body_voxels(&preprocess::body_mask(&volume, threshold))
    });
    voxels_to_array(&voxels).into_pyarray(py)
}

/// Indices of voxels in bounds in both views, at most `max_count` of them.
#[pyfunction]
#[pyo3(signature = (voxels_a, voxels_b, patch_size, max_count, seed=None))]
pub fn filter_pair(
    voxels_a: PyReadonlyArray2<'_, i64>,
    voxels_b: PyReadonlyArray2<'_, i64>,
    patch_size: Vec<usize>,
    max_count: usize,
    seed: Option<u64>,
) -> PyResult<Vec<usize>> {
    let patch_shape = parse_shape3(&patch_size, "patch_size")?;
    let a = parse_voxels(voxels_a.as_array(), "voxels_a")?;
    let b = parse_voxels(voxels_b.as_array(), "voxels_b")?;
    if a.len() != b.len() {
        return Err(pyo3::exceptions::PyValueError::new_err(format!(
            "filter_pair: voxel sets differ in length ({} vs {})",
            a.len(),
            b.len()
        )));
    }
    if max_count == 0 {
        return Err(pyo3::exceptions::PyValueError::new_err(
            "filter_pair: max_count must be positive",
        ));
    }
    sampling::filter_pair(&a, &b, patch_shape, max_count, &mut get_rng(seed))
        .map_err(|e| to_py_err(e, "filter_pair"))
}
