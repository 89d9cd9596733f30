use indicatif::{ProgressBar, ProgressStyle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::types::AnnotationRecord;

/// Parse a JSON file straight from a buffered file stream.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| ConvertError::from_json(path, e))
}

/// Read and parse a single custom annotation record.
pub fn read_record(path: &Path) -> Result<AnnotationRecord> {
    read_json(path)
}

/// Write a value as 2-space indented JSON. Non-ASCII text is written as-is.
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)
        .map_err(|e| ConvertError::from_json(path, e))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

pub fn write_record(path: &Path, record: &AnnotationRecord) -> Result<()> {
    write_json_pretty(path, record)
}

/// Create a progress bar with the given length and label
pub fn create_progress_bar(len: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{}] [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} ({{eta}})",
                label
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Create a fresh, empty output directory, replacing any previous one.
pub fn create_output_directory(path: &Path) -> std::io::Result<std::path::PathBuf> {
    if path.exists() {
        log::warn!(
            "Directory {:?} already exists. Deleting and recreating it.",
            path
        );
        fs::remove_dir_all(path).and_then(|_| fs::create_dir_all(path))?;
    } else {
        fs::create_dir_all(path)?;
    }
    Ok(path.to_path_buf())
}

/// Create a directory (and parents) if missing, keeping existing content.
pub fn ensure_directory(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)
}
