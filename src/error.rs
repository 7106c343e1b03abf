//! Error types for vox2vec.

use std::path::PathBuf;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while preparing scans and sampling view pairs.
///
/// Precondition violations (an anchor outside the volume, mismatched voxel
/// sets) are programmer errors and panic instead of surfacing here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure while reading a configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Array or patch dimensions are unusable.
    #[error("invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// Two arrays that must agree in shape do not.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// No voxel is in bounds in both views of a pair.
    #[error("none of {candidates} voxels is valid in both views of patch shape {patch_shape:?}")]
    EmptyOverlap {
        /// Number of index-aligned voxels that were checked.
        candidates: usize,
        /// Patch shape the views were cropped to.
        patch_shape: [usize; 3],
    },

    /// The volume source has no scan under this identifier.
    #[error("unknown scan identifier: {0}")]
    UnknownId(String),

    /// Dataset index past the end.
    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Dataset length.
        len: usize,
    },

    /// The scan was rejected during preprocessing.
    #[error("scan {id} rejected: {reason}")]
    Rejected {
        /// Identifier of the rejected scan.
        id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A configuration file path did not exist.
    #[error("configuration file not found: {}", .0.display())]
    MissingConfig(PathBuf),
}
