//! Where scans come from.
//!
//! The sampler only needs "identifier in, volume and body voxels out".
//! Decoding files and caching preprocessed scans are the job of whoever
//! implements [`VolumeSource`].

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::preprocess::{prepare_scan, Preprocessing};
use crate::volume::{Scan, Volume};

/// Provider of prepared scans by identifier.
pub trait VolumeSource: Send + Sync {
    /// All identifiers this source can load, in a stable order.
    fn ids(&self) -> Vec<String>;

    /// Load the scan stored under `id`.
    fn load(&self, id: &str) -> Result<Scan>;
}

/// Scans held in memory, keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    scans: BTreeMap<String, Scan>,
}

impl InMemorySource {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a prepared scan.
    pub fn insert(&mut self, id: impl Into<String>, scan: Scan) {
        self.scans.insert(id.into(), scan);
    }

    /// Prepare raw volumes and keep those that pass preprocessing.
    ///
    /// Rejected volumes are skipped (and logged at debug level); any other
    /// error aborts.
    pub fn from_volumes<I, K>(
        volumes: I,
        preprocessing: &Preprocessing,
        patch_shape: [usize; 3],
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Volume)>,
        K: Into<String>,
    {
        let mut source = Self::new();
        for (id, volume) in volumes {
            let id = id.into();
            match prepare_scan(&id, volume, preprocessing, patch_shape) {
                Ok(scan) => source.insert(id, scan),
                Err(Error::Rejected { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        tracing::debug!(scans = source.len(), "built in-memory source");
        Ok(source)
    }

    /// Number of scans.
    pub fn len(&self) -> usize {
        self.scans.len()
    }

    /// Whether the source holds no scans.
    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }
}

impl VolumeSource for InMemorySource {
    fn ids(&self) -> Vec<String> {
        self.scans.keys().cloned().collect()
    }

    fn load(&self, id: &str) -> Result<Scan> {
        self.scans
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownId(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_from_volumes_skips_rejected() {
        let body = Volume::new(Array3::from_elem((8, 8, 8), 100.0));
        let small = Volume::new(Array3::from_elem((2, 8, 8), 100.0));
        let dark = Volume::new(Array3::from_elem((8, 8, 8), 0.0));
        let source = InMemorySource::from_volumes(
            [("body", body), ("small", small), ("dark", dark)],
            &Preprocessing::mri(),
            [4, 4, 4],
        )
        .unwrap();
        assert_eq!(source.ids(), vec!["body".to_string()]);
        assert_eq!(source.load("body").unwrap().body_voxels.len(), 512);
    }

    #[test]
    fn test_unknown_id() {
        let source = InMemorySource::new();
        assert!(matches!(source.load("missing"), Err(Error::UnknownId(_))));
    }
}
