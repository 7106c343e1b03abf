//! Indexable dataset of pair batches.

use rand::Rng;

use crate::config::DatasetConfig;
use crate::error::{Error, Result};
use crate::sampling::{sample_batch, PairBatch, PairSampler};
use crate::source::{InMemorySource, VolumeSource};
use crate::transforms::get_rng;
use crate::volume::Volume;

/// One batch of view pairs per scan identifier.
///
/// Index `i` always refers to the same scan; every [`PairDataset::get`] draws
/// fresh boxes, augmentations and voxels from it.
#[derive(Debug)]
pub struct PairDataset<S: VolumeSource> {
    source: S,
    ids: Vec<String>,
    sampler: PairSampler,
    batch_size: usize,
}

impl<S: VolumeSource> PairDataset<S> {
    /// Index the scans of `source` under a validated `config`.
    pub fn new(source: S, config: &DatasetConfig) -> Result<Self> {
        config.validate()?;
        let ids = source.ids();
        tracing::debug!(scans = ids.len(), "indexed pair dataset");
        Ok(Self {
            source,
            ids,
            sampler: config.sampler(),
            batch_size: config.batch_size,
        })
    }

    /// Number of scans.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether there are no scans.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Scan identifiers in index order.
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// The pair sampler built from the config.
    pub fn sampler(&self) -> &PairSampler {
        &self.sampler
    }

    /// The underlying source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Draw a batch from the scan at `index`.
    pub fn get<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> Result<PairBatch> {
        let id = self.ids.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.ids.len(),
        })?;
        let scan = self.source.load(id)?;
        self.sampler.check_scan(&scan)?;
        sample_batch(&scan, &self.sampler, self.batch_size, rng)
    }

    /// Draw a batch with an optionally seeded generator.
    pub fn get_seeded(&self, index: usize, seed: Option<u64>) -> Result<PairBatch> {
        self.get(index, &mut get_rng(seed))
    }
}

impl PairDataset<InMemorySource> {
    /// Prepare raw volumes with the config's preprocessing and index those
    /// that pass.
    pub fn from_volumes<I, K>(volumes: I, config: &DatasetConfig) -> Result<Self>
    where
        I: IntoIterator<Item = (K, Volume)>,
        K: Into<String>,
    {
        config.validate()?;
        let source =
            InMemorySource::from_volumes(volumes, &config.preprocessing(), config.patch_size)?;
        Self::new(source, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Modality;
    use crate::volume::Scan;
    use ndarray::Array3;

    fn blob(shape: (usize, usize, usize), inside: f32, outside: f32) -> Volume {
        Volume::new(Array3::from_shape_fn(shape, |(i, j, k)| {
            let c = [shape.0 / 2, shape.1 / 2, shape.2 / 2];
            let d = [i.abs_diff(c[0]), j.abs_diff(c[1]), k.abs_diff(c[2])];
            if d.iter().all(|&d| d <= 6) {
                inside
            } else {
                outside
            }
        }))
    }

    #[test]
    fn test_mri_dataset_carries_raw_patches() {
        let config = DatasetConfig::new(
            [8, 8, 8],
            6,
            2,
            Modality::Mri {
                appearance: crate::transforms::AppearanceTransform::default().local_blocks(20),
            },
        );
        let dataset = PairDataset::from_volumes(
            [("a", blob((24, 24, 24), 200.0, 0.0)), ("b", blob((4, 24, 24), 200.0, 0.0))],
            &config,
        )
        .unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.ids(), &["a".to_string()]);

        let batch = dataset.get_seeded(0, Some(3)).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.patches_a.shape(), &[2, 1, 8, 8, 8]);
        assert_eq!(batch.raw_patches_b.unwrap().shape(), &[2, 1, 8, 8, 8]);
    }

    #[test]
    fn test_ct_dataset_windows_to_unit_range() {
        let config = DatasetConfig::new(
            [8, 8, 8],
            6,
            3,
            Modality::ct((-1350.0, 1000.0), (-1000.0, 300.0), (-1350.0, 1000.0)),
        );
        let dataset =
            PairDataset::from_volumes([("ct", blob((20, 20, 20), 40.0, -1000.0))], &config)
                .unwrap();
        let batch = dataset.get_seeded(0, Some(5)).unwrap();
        assert!(batch.raw_patches_a.is_none());
        assert!(batch
            .patches_a
            .iter()
            .chain(batch.patches_b.iter())
            .all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_index_out_of_range() {
        let config = DatasetConfig::new([4, 4, 4], 2, 1, Modality::mri());
        let dataset = PairDataset::new(InMemorySource::new(), &config).unwrap();
        assert!(dataset.is_empty());
        assert!(matches!(
            dataset.get_seeded(0, Some(0)),
            Err(Error::IndexOutOfRange { index: 0, len: 0 })
        ));
    }

    #[test]
    fn test_scan_smaller_than_patch_is_error() {
        let mut source = InMemorySource::new();
        let volume = Volume::new(Array3::zeros((4, 4, 4)));
        source.insert("tiny", Scan::new(volume, vec![[1, 1, 1]]).unwrap());
        let config = DatasetConfig::new([8, 8, 8], 2, 1, Modality::mri());
        let dataset = PairDataset::new(source, &config).unwrap();
        assert!(matches!(
            dataset.get_seeded(0, Some(0)),
            Err(Error::InvalidDimensions(_))
        ));
    }
}
