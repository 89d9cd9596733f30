use glob::glob;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};
use crate::types::is_image_file;

/// All files directly inside `dir` with the given extension, sorted by path.
///
/// Sorting makes iteration order (and therefore id assignment) independent of
/// the filesystem's listing order.
pub fn list_files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/*.{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        extension
    );
    let mut files = Vec::new();
    for entry in glob(&pattern)? {
        let path = entry.map_err(|e| ConvertError::Io(e.into_error()))?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// All regular files directly inside `dir`, sorted by path.
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Directory listing of an image folder, addressable by full file name or by stem.
#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    dir: PathBuf,
    by_name: HashMap<String, String>,
    by_stem: HashMap<String, String>,
}

impl ImageIndex {
    pub fn scan(dir: &Path) -> Result<Self> {
        let mut by_name = HashMap::new();
        let mut by_stem = HashMap::new();
        for path in list_files(dir)? {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            by_name.insert(name.to_string(), name.to_string());
            if !is_image_file(&path) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if let Some(existing) = by_stem.get(stem) {
                    log::warn!(
                        "Images {} and {} share the stem '{}', using {}",
                        existing,
                        name,
                        stem,
                        existing
                    );
                } else {
                    by_stem.insert(stem.to_string(), name.to_string());
                }
            }
        }
        log::debug!("Indexed {} image(s) in {:?}", by_stem.len(), dir);
        Ok(Self {
            dir: dir.to_path_buf(),
            by_name,
            by_stem,
        })
    }

    /// Resolve a file name as listed on disk: exact name first, then an image
    /// sharing the name's stem (for names written without extension).
    pub fn resolve_name(&self, file_name: &str) -> Result<&str> {
        if let Some(found) = self.by_name.get(file_name) {
            return Ok(found);
        }
        let stem = Path::new(file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(file_name);
        self.by_stem
            .get(file_name)
            .or_else(|| self.by_stem.get(stem))
            .map(String::as_str)
            .ok_or_else(|| self.not_found(file_name))
    }

    /// Full path of the image whose stem is `stem`.
    pub fn find_by_stem(&self, stem: &str) -> Result<PathBuf> {
        self.by_stem
            .get(stem)
            .map(|name| self.dir.join(name))
            .ok_or_else(|| self.not_found(stem))
    }

    fn not_found(&self, name: &str) -> ConvertError {
        ConvertError::ImageNotFound {
            name: name.to_string(),
            dir: self.dir.clone(),
        }
    }
}

/// Resolves pixel dimensions of an image file. Needed wherever the annotation
/// format does not carry the image size (YOLO).
pub trait ImageSizeProbe: Send + Sync {
    /// Returns `(width, height)`.
    fn dimensions(&self, path: &Path) -> Result<(u32, u32)>;
}

/// Reads the image header with the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateProbe;

impl ImageSizeProbe for ImageCrateProbe {
    fn dimensions(&self, path: &Path) -> Result<(u32, u32)> {
        image::image_dimensions(path).map_err(|source| ConvertError::ImageProbe {
            path: path.to_path_buf(),
            source,
        })
    }
}
