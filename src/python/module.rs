//! Python module definition.

use pyo3::prelude::*;

use super::sampler;

#[pymodule]
fn _vox2vec(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<sampler::PyPairSampler>()?;

    m.add_function(wrap_pyfunction!(sampler::body_voxels, m)?)?;
    m.add_function(wrap_pyfunction!(sampler::filter_pair, m)?)?;

    Ok(())
}
