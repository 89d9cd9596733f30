//! Error types for annotation conversion.

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::validator::FileValidation;

/// Broad failure classes. Every [`ConvertError`] belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required key is missing or a field has the wrong shape.
    Schema,
    /// A label, class index, image or image id could not be resolved.
    Lookup,
    /// One or more files in a batch failed label validation.
    Validation,
    /// Filesystem, image probing or serialization backend failure.
    Io,
    /// Invalid run configuration (split fractions, task/mode combination).
    Config,
}

/// Errors that can occur while converting annotations.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema error in {path:?}: {message}")]
    Schema { path: PathBuf, message: String },

    #[error("Malformed YOLO line {line} in {path:?}: {message}")]
    YoloLine {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Schema error in {path:?}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: quick_xml::DeError,
    },

    #[error("Label '{label}' is not in the class table")]
    UnknownLabel { label: String },

    #[error("Class index {index} is out of range for {len} class(es)")]
    ClassIndexOutOfRange { index: i64, len: usize },

    #[error("Duplicate class '{label}' in class list")]
    DuplicateClass { label: String },

    #[error("Image '{name}' not found in {dir:?}")]
    ImageNotFound { name: String, dir: PathBuf },

    #[error("Annotation {annotation_id} references unknown image id {image_id}")]
    UnknownImageId { annotation_id: u32, image_id: u32 },

    #[error("Annotation {annotation_id} references unknown category id {category_id}")]
    UnknownCategoryId {
        annotation_id: u32,
        category_id: u32,
    },

    #[error("{} file(s) failed label validation", failures.len())]
    Validation { failures: Vec<FileValidation> },

    #[error("Failed to read image size of {path:?}: {source}")]
    ImageProbe {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    /// Create a schema error for the given file.
    pub fn schema(path: &Path, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Classify a `serde_json` failure: transport errors become `Io`, everything
    /// else (syntax, missing fields, wrong types) is a schema error.
    pub fn from_json(path: &Path, err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::Io(err.into())
        } else {
            Self::schema(path, err.to_string())
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema { .. } | Self::YoloLine { .. } | Self::Xml { .. } => ErrorKind::Schema,
            Self::UnknownLabel { .. }
            | Self::ClassIndexOutOfRange { .. }
            | Self::ImageNotFound { .. }
            | Self::UnknownImageId { .. }
            | Self::UnknownCategoryId { .. } => ErrorKind::Lookup,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Io(_) | Self::ImageProbe { .. } | Self::Pattern(_) | Self::Yaml(_) => {
                ErrorKind::Io
            }
            Self::DuplicateClass { .. } | Self::InvalidSplit(_) | Self::InvalidConfig(_) => {
                ErrorKind::Config
            }
        }
    }
}
