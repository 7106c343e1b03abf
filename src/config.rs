//! Dataset configuration, loadable from JSON.
//!
//! ```json
//! {
//!   "patch_size": [32, 32, 32],
//!   "max_num_voxels_per_patch": 1024,
//!   "batch_size": 8,
//!   "modality": {
//!     "kind": "ct",
//!     "window_hu": [-1350.0, 1000.0],
//!     "min_window_hu": [-1000.0, 300.0],
//!     "max_window_hu": [-1350.0, 1000.0]
//!   }
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::preprocess::Preprocessing;
use crate::sampling::{BoxSampler, PairSampler};
use crate::transforms::{AppearanceTransform, IntensityAugment, WindowConfig};

/// Imaging modality and its intensity augmentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Modality {
    /// MRI: the appearance transform only. Batches carry the
    /// pre-appearance patches too.
    Mri {
        /// Appearance transform rates.
        #[serde(default)]
        appearance: AppearanceTransform,
    },
    /// CT in Hounsfield units: blur/sharpen, noise, then a jittered window
    /// rescaled to `[0, 1]`.
    Ct {
        /// Default window.
        window_hu: (f32, f32),
        /// Narrowest jittered window.
        min_window_hu: (f32, f32),
        /// Widest jittered window.
        max_window_hu: (f32, f32),
    },
}

impl Modality {
    /// MRI with the default appearance rates.
    pub fn mri() -> Self {
        Modality::Mri {
            appearance: AppearanceTransform::default(),
        }
    }

    /// CT with the given windows.
    pub fn ct(window_hu: (f32, f32), min_window_hu: (f32, f32), max_window_hu: (f32, f32)) -> Self {
        Modality::Ct {
            window_hu,
            min_window_hu,
            max_window_hu,
        }
    }

    /// Intensity chain for this modality.
    pub fn augment(&self) -> IntensityAugment {
        match self {
            Modality::Mri { appearance } => IntensityAugment::mri(appearance.clone()),
            Modality::Ct {
                window_hu,
                min_window_hu,
                max_window_hu,
            } => IntensityAugment::ct(WindowConfig::new(*window_hu, *min_window_hu, *max_window_hu)),
        }
    }

    /// Preprocessing for this modality.
    pub fn preprocessing(&self) -> Preprocessing {
        match self {
            Modality::Mri { .. } => Preprocessing::mri(),
            Modality::Ct { .. } => Preprocessing::ct(),
        }
    }
}

/// Everything a [`crate::PairDataset`] needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Shape of every patch.
    pub patch_size: [usize; 3],
    /// Upper bound on corresponding voxels per pair.
    pub max_num_voxels_per_patch: usize,
    /// Pairs per batch.
    pub batch_size: usize,
    /// Modality and its augmentation.
    pub modality: Modality,
    /// Random rescale range for view boxes.
    #[serde(default)]
    pub rescale: Option<(f32, f32)>,
    /// Probability of rotating a view patch.
    #[serde(default)]
    pub rotate_prob: f32,
    /// Override of the modality's body threshold.
    #[serde(default)]
    pub body_threshold: Option<f32>,
}

impl DatasetConfig {
    /// Config with plain crops.
    pub fn new(
        patch_size: [usize; 3],
        max_num_voxels_per_patch: usize,
        batch_size: usize,
        modality: Modality,
    ) -> Self {
        Self {
            patch_size,
            max_num_voxels_per_patch,
            batch_size,
            modality,
            rescale: None,
            rotate_prob: 0.0,
            body_threshold: None,
        }
    }

    /// Enable random rescaling of view boxes.
    pub fn rescale(mut self, min: f32, max: f32) -> Self {
        self.rescale = Some((min, max));
        self
    }

    /// Rotate view patches with probability `prob`.
    pub fn rotate_prob(mut self, prob: f32) -> Self {
        self.rotate_prob = prob;
        self
    }

    /// Override the body threshold.
    pub fn body_threshold(mut self, threshold: f32) -> Self {
        self.body_threshold = Some(threshold);
        self
    }

    /// Parse a config from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config from a JSON file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::MissingConfig(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Spatial draw described by this config.
    pub fn boxes(&self) -> BoxSampler {
        let boxes = BoxSampler::new().rotate(self.rotate_prob, (0, 1));
        match self.rescale {
            Some((min, max)) => boxes.scale(min, max),
            None => boxes,
        }
    }

    /// Pair sampler described by this config.
    pub fn sampler(&self) -> PairSampler {
        PairSampler::new(
            self.patch_size,
            self.max_num_voxels_per_patch,
            self.modality.augment(),
        )
        .boxes(self.boxes())
    }

    /// Preprocessing described by this config.
    pub fn preprocessing(&self) -> Preprocessing {
        let mut preprocessing = self.modality.preprocessing();
        if let Some(threshold) = self.body_threshold {
            preprocessing.body_threshold = threshold;
        }
        preprocessing
    }

    /// Check every field.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Configuration(
                "batch_size must be positive".to_string(),
            ));
        }
        if let Some(threshold) = self.body_threshold {
            if !threshold.is_finite() {
                return Err(Error::Configuration(format!(
                    "body_threshold must be finite (got {})",
                    threshold
                )));
            }
        }
        self.sampler().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CT_JSON: &str = r#"{
        "patch_size": [32, 32, 32],
        "max_num_voxels_per_patch": 1024,
        "batch_size": 8,
        "modality": {
            "kind": "ct",
            "window_hu": [-1350.0, 1000.0],
            "min_window_hu": [-1000.0, 300.0],
            "max_window_hu": [-1350.0, 1000.0]
        }
    }"#;

    #[test]
    fn test_parse_ct() {
        let config = DatasetConfig::from_json_str(CT_JSON).unwrap();
        assert_eq!(config.patch_size, [32, 32, 32]);
        assert_eq!(config.rescale, None);
        assert_eq!(config.rotate_prob, 0.0);
        let augment = config.modality.augment();
        assert!(augment.window.is_some());
        assert!(augment.appearance.is_none());
        assert_eq!(config.preprocessing(), Preprocessing::ct());
    }

    #[test]
    fn test_parse_mri_defaults() {
        let json = r#"{
            "patch_size": [16, 16, 16],
            "max_num_voxels_per_patch": 64,
            "batch_size": 2,
            "modality": { "kind": "mri" },
            "rescale": [0.8, 1.2],
            "body_threshold": 5.0
        }"#;
        let config = DatasetConfig::from_json_str(json).unwrap();
        assert_eq!(config.modality, Modality::mri());
        assert_eq!(config.boxes().scale_range, Some((0.8, 1.2)));
        assert_eq!(config.preprocessing().body_threshold, 5.0);
        assert!(config.sampler().augment.appearance.is_some());
    }

    #[test]
    fn test_rejects_out_of_range_rates() {
        let json = r#"{
            "patch_size": [16, 16, 16],
            "max_num_voxels_per_patch": 64,
            "batch_size": 2,
            "modality": { "kind": "mri", "appearance": { "local_rate": 1.5, "nonlinear_rate": 0.9, "paint_rate": 0.9, "inpaint_rate": 0.2 } }
        }"#;
        assert!(matches!(
            DatasetConfig::from_json_str(json),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_rejects_bad_fields() {
        let config = DatasetConfig::new([16, 16, 16], 64, 0, Modality::mri());
        assert!(config.validate().is_err());
        let config = DatasetConfig::new([16, 0, 16], 64, 2, Modality::mri());
        assert!(config.validate().is_err());
        let config = DatasetConfig::new([16, 16, 16], 64, 2, Modality::mri()).rotate_prob(2.0);
        assert!(config.validate().is_err());
        let config = DatasetConfig::new(
            [16, 16, 16],
            64,
            2,
            Modality::ct((0.0, 1.0), (-10.0, 20.0), (-5.0, 30.0)),
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_json_file_roundtrip() {
        let config = DatasetConfig::new([8, 8, 8], 16, 4, Modality::mri()).rescale(0.9, 1.1);
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(config.to_json_string().unwrap().as_bytes()).unwrap();
        let loaded = DatasetConfig::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = DatasetConfig::from_json_file(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, Error::MissingConfig(_)));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            DatasetConfig::from_json_str("{ not json"),
            Err(Error::Json(_))
        ));
    }
}
