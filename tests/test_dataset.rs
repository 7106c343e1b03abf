//! Dataset-level tests: preprocessing, config loading and batch retrieval.

use std::io::Write;

use ndarray::Array3;
use tempfile::NamedTempFile;
use vox2vec::{DatasetConfig, Error, Modality, PairDataset, Volume};

/// Ellipsoidal "body" of soft tissue in air, with an air pocket inside.
fn ct_phantom(shape: (usize, usize, usize)) -> Volume {
    let c = [shape.0 as f32 / 2.0, shape.1 as f32 / 2.0, shape.2 as f32 / 2.0];
    Volume::new(Array3::from_shape_fn(shape, |(i, j, k)| {
        let r = [
            (i as f32 - c[0]) / (c[0] * 0.8),
            (j as f32 - c[1]) / (c[1] * 0.8),
            (k as f32 - c[2]) / (c[2] * 0.8),
        ];
        let d = r.iter().map(|v| v * v).sum::<f32>();
        if d < 0.05 {
            -900.0
        } else if d < 1.0 {
            40.0
        } else {
            -1000.0
        }
    }))
}

const CT_CONFIG: &str = r#"{
    "patch_size": [16, 16, 16],
    "max_num_voxels_per_patch": 32,
    "batch_size": 4,
    "modality": {
        "kind": "ct",
        "window_hu": [-1350.0, 1000.0],
        "min_window_hu": [-1000.0, 300.0],
        "max_window_hu": [-1350.0, 1000.0]
    },
    "rescale": [0.9, 1.1]
}"#;

#[test]
fn test_ct_dataset_from_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(CT_CONFIG.as_bytes()).unwrap();
    let config = DatasetConfig::from_json_file(file.path()).unwrap();

    let dataset = PairDataset::from_volumes(
        [
            ("phantom", ct_phantom((40, 40, 40))),
            ("air", Volume::new(Array3::from_elem((40, 40, 40), -1000.0))),
            ("thin", ct_phantom((40, 40, 8))),
        ],
        &config,
    )
    .unwrap();
    assert_eq!(dataset.ids(), &["phantom".to_string()]);

    let batch = dataset.get_seeded(0, Some(1)).unwrap();
    assert_eq!(batch.patches_a.shape(), &[4, 1, 16, 16, 16]);
    assert!(batch.raw_patches_a.is_none());
    for (a, b) in batch.voxels_a.iter().zip(&batch.voxels_b) {
        assert_eq!(a.len(), b.len());
        assert!((1..=32).contains(&a.len()));
    }
}

#[test]
fn test_seeded_batches_are_reproducible() {
    let config = DatasetConfig::new([12, 12, 12], 8, 2, Modality::mri());
    let volume = Volume::new(Array3::from_shape_fn((30, 30, 30), |(i, j, k)| {
        if (5..25).contains(&i) && (5..25).contains(&j) {
            50.0 + k as f32
        } else {
            0.0
        }
    }));
    let dataset = PairDataset::from_volumes([("mri", volume)], &config).unwrap();

    let a = dataset.get_seeded(0, Some(77)).unwrap();
    let b = dataset.get_seeded(0, Some(77)).unwrap();
    assert_eq!(a.patches_a, b.patches_a);
    assert_eq!(a.raw_patches_a, b.raw_patches_a);
    assert_eq!(a.voxels_b, b.voxels_b);
    assert!(a.raw_patches_a.is_some());
}

#[test]
fn test_invalid_config_is_rejected_before_sampling() {
    let config = DatasetConfig::new([16, 16, 16], 0, 4, Modality::mri());
    let err = PairDataset::from_volumes([("x", ct_phantom((20, 20, 20)))], &config).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}
