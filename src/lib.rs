//! # vox2vec
//!
//! Paired-view sampling and augmentation for self-supervised pretraining on
//! 3D MRI and CT volumes.
//!
//! Each training example is a pair of patches cut from the same volume around
//! a shared anchor voxel. The two views are drawn independently (position,
//! optional rescale and rotation, intensity augmentation), and the voxels that
//! lie inside both views are returned as index-aligned coordinate lists so a
//! model can be trained to agree on their features.
//!
//! ## Quick start
//!
//! ```no_run
//! use vox2vec::{DatasetConfig, Modality, PairDataset, Volume};
//! use ndarray::Array3;
//!
//! let config = DatasetConfig::new([32, 32, 32], 1024, 8, Modality::mri());
//! let volume = Volume::new(Array3::<f32>::from_elem((96, 96, 96), 100.0));
//! let dataset = PairDataset::from_volumes([("scan-0", volume)], &config)?;
//! let batch = dataset.get_seeded(0, Some(42))?;
//! assert_eq!(batch.patches_a.shape(), &[8, 1, 32, 32, 32]);
//! # Ok::<(), vox2vec::Error>(())
//! ```
//!
//! Randomness is always passed in explicitly; seed a
//! [`rand_chacha::ChaCha8Rng`] (or use [`transforms::get_rng`]) for
//! reproducible draws.

#![warn(missing_docs)]

pub mod config;
pub mod dataset;
pub mod error;
pub mod preprocess;
pub mod sampling;
pub mod source;
pub mod transforms;
pub mod volume;

#[cfg(feature = "python")]
mod python;

pub use config::{DatasetConfig, Modality};
pub use dataset::PairDataset;
pub use error::{Error, Result};
pub use preprocess::{prepare_scan, Preprocessing};
pub use sampling::{
    filter_pair, sample_batch, sample_box, sample_pair, Box3, BoxSampler, PairBatch, PairSampler,
    ViewPair,
};
pub use source::{InMemorySource, VolumeSource};
pub use transforms::{AppearanceTransform, IntensityAugment, WindowConfig};
pub use volume::{Scan, Volume, Voxel};
