//! Python bindings for vox2vec.

pub mod module;
pub mod sampler;
pub mod validation;
