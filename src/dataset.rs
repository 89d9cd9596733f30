//! Train/val/test partitioning of a converted YOLO corpus.

use log::info;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::fs::{self, copy};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};
use crate::utils::{create_output_directory, ensure_directory};

/// Name of the dataset root created under the YOLO output directory.
pub const DATASET_DIR: &str = "YoloDatasets";
pub const MANIFEST_FILE: &str = "dataset.yaml";

/// One converted image and its label file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub image: PathBuf,
    pub label: PathBuf,
}

// Struct to hold the split datasets for training, validation, and testing.
// `test` is a copy of `val`.
#[derive(Debug, Clone)]
pub struct SplitData {
    pub train: Vec<Sample>,
    pub val: Vec<Sample>,
    pub test: Vec<Sample>,
}

// Struct to hold the paths to the output directories for train/val/test splits
#[derive(Debug, Clone)]
pub struct OutputDirs {
    pub root: PathBuf,
    pub train_images_dir: PathBuf,
    pub val_images_dir: PathBuf,
    pub test_images_dir: PathBuf,
    pub train_labels_dir: PathBuf,
    pub val_labels_dir: PathBuf,
    pub test_labels_dir: PathBuf,
}

/// Training manifest consumed by YOLO tooling.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetManifest {
    pub train: String,
    pub val: String,
    pub test: String,
    pub nc: usize,
    pub names: Vec<String>,
}

/// Number of (train, val) samples for `total` samples.
///
/// `val = ceil(val_size * total)`, `train = floor(train_size * total)`. Both must
/// be non-zero and fit together in `total`.
pub fn split_counts(total: usize, train_size: f64, val_size: f64) -> Result<(usize, usize)> {
    for (name, size) in [("train_size", train_size), ("val_size", val_size)] {
        if !(size > 0.0 && size < 1.0) {
            return Err(ConvertError::InvalidSplit(format!(
                "{} must be between 0 and 1, got {}",
                name, size
            )));
        }
    }
    let val = (val_size * total as f64).ceil() as usize;
    let train = (train_size * total as f64).floor() as usize;
    if train == 0 || val == 0 {
        return Err(ConvertError::InvalidSplit(format!(
            "{} sample(s) with train_size={} and val_size={} leaves an empty partition",
            total, train_size, val_size
        )));
    }
    if train + val > total {
        return Err(ConvertError::InvalidSplit(format!(
            "train ({}) + val ({}) exceeds the {} available sample(s)",
            train, val, total
        )));
    }
    Ok((train, val))
}

/// Split samples by a seeded random permutation. The test partition duplicates
/// the validation partition.
pub fn split_samples(
    samples: &[Sample],
    train_size: f64,
    val_size: f64,
    seed: u64,
) -> Result<SplitData> {
    let (train_count, val_count) = split_counts(samples.len(), train_size, val_size)?;

    let mut order: Vec<usize> = (0..samples.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let val: Vec<Sample> = order[..val_count]
        .iter()
        .map(|&i| samples[i].clone())
        .collect();
    let train: Vec<Sample> = order[val_count..val_count + train_count]
        .iter()
        .map(|&i| samples[i].clone())
        .collect();

    Ok(SplitData {
        train,
        test: val.clone(),
        val,
    })
}

/// Set up `images/{train,val,test}` and `labels/{train,val,test}` under `root`.
pub fn setup_output_directories(root: &Path) -> Result<OutputDirs> {
    create_output_directory(root)?;
    let images_dir = root.join("images");
    let labels_dir = root.join("labels");

    let dirs = OutputDirs {
        root: root.to_path_buf(),
        train_images_dir: images_dir.join("train"),
        val_images_dir: images_dir.join("val"),
        test_images_dir: images_dir.join("test"),
        train_labels_dir: labels_dir.join("train"),
        val_labels_dir: labels_dir.join("val"),
        test_labels_dir: labels_dir.join("test"),
    };
    for dir in [
        &dirs.train_images_dir,
        &dirs.val_images_dir,
        &dirs.test_images_dir,
        &dirs.train_labels_dir,
        &dirs.val_labels_dir,
        &dirs.test_labels_dir,
    ] {
        ensure_directory(dir)?;
    }
    Ok(dirs)
}

fn copy_samples(samples: &[Sample], images_dir: &Path, labels_dir: &Path) -> Result<()> {
    for sample in samples {
        copy_into(&sample.image, images_dir)?;
        copy_into(&sample.label, labels_dir)?;
    }
    Ok(())
}

fn copy_into(file: &Path, dir: &Path) -> Result<()> {
    let name = file.file_name().ok_or_else(|| {
        ConvertError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{:?} has no file name", file),
        ))
    })?;
    copy(file, dir.join(name))?;
    Ok(())
}

/// Copy every partition into its directories.
pub fn materialize(split: &SplitData, dirs: &OutputDirs) -> Result<()> {
    copy_samples(&split.train, &dirs.train_images_dir, &dirs.train_labels_dir)?;
    copy_samples(&split.val, &dirs.val_images_dir, &dirs.val_labels_dir)?;
    copy_samples(&split.test, &dirs.test_images_dir, &dirs.test_labels_dir)?;
    Ok(())
}

/// Create the dataset.yaml file for YOLO training
pub fn create_dataset_yaml(dirs: &OutputDirs, class_names: &[String]) -> Result<PathBuf> {
    let manifest = DatasetManifest {
        train: dirs.train_images_dir.to_string_lossy().into_owned(),
        val: dirs.val_images_dir.to_string_lossy().into_owned(),
        test: dirs.test_images_dir.to_string_lossy().into_owned(),
        nc: class_names.len(),
        names: class_names.to_vec(),
    };
    let path = dirs.root.join(MANIFEST_FILE);
    let mut file = fs::File::create(&path)?;
    file.write_all(serde_yaml::to_string(&manifest)?.as_bytes())?;
    Ok(path)
}

/// Split, materialize and write the manifest under `root`.
pub fn partition_dataset(
    samples: &[Sample],
    class_names: &[String],
    root: &Path,
    train_size: f64,
    val_size: f64,
    seed: u64,
) -> Result<SplitData> {
    let split = split_samples(samples, train_size, val_size, seed)?;
    info!(
        "Splitting {} samples: {} train, {} val, {} test",
        samples.len(),
        split.train.len(),
        split.val.len(),
        split.test.len()
    );
    let dirs = setup_output_directories(root)?;
    materialize(&split, &dirs)?;
    info!("Creating {} file...", MANIFEST_FILE);
    create_dataset_yaml(&dirs, class_names)?;
    Ok(split)
}
