//! Paired-view sampling: boxes, crops, correspondence filtering and batches.
//!
//! A pair is built by drawing one anchor voxel, sampling two independent
//! views around it, and keeping only voxels that are in bounds in both.

pub mod batch;
pub mod bbox;
pub mod correspondence;
pub mod pair;
pub mod view;

pub use batch::{sample_batch, PairBatch};
pub use bbox::{sample_box, Box3, BoxSampler};
pub use correspondence::{filter_pair, select, valid_mask};
pub use pair::{sample_pair, PairSampler, ViewPair};
pub use view::{extract, sample_view, translate, GeometricView, ViewTransform};
