//! Ordered label table shared by the index-based formats (YOLO, COCO).

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{ConvertError, Result};

/// Ordered, index-addressable list of unique labels. The index of a label is
/// its class id. Built once and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassTable {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl ClassTable {
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names = Vec::new();
        let mut index = HashMap::new();
        for label in labels {
            let label = label.into();
            if index.contains_key(&label) {
                return Err(ConvertError::DuplicateClass { label });
            }
            index.insert(label.clone(), names.len());
            names.push(label);
        }
        Ok(Self { names, index })
    }

    /// Read a classes file with one label per line. Trailing blank lines are
    /// ignored; a blank line between labels is a class of its own.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let mut lines: Vec<&str> = content.lines().map(str::trim_end).collect();
        while lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        let table = Self::new(lines)?;
        log::info!("Loaded {} classes from {:?}", table.len(), path);
        Ok(table)
    }

    pub fn index_of(&self, label: &str) -> Result<usize> {
        self.index
            .get(label)
            .copied()
            .ok_or_else(|| ConvertError::UnknownLabel {
                label: label.to_string(),
            })
    }

    pub fn label_of(&self, index: usize) -> Result<&str> {
        self.names
            .get(index)
            .map(String::as_str)
            .ok_or(ConvertError::ClassIndexOutOfRange {
                index: index as i64,
                len: self.names.len(),
            })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_lookup_both_ways() {
        let table = ClassTable::new(["car", "person"]).unwrap();
        assert_eq!(table.index_of("person").unwrap(), 1);
        assert_eq!(table.label_of(0).unwrap(), "car");
        assert_eq!(table.index_of("dog").unwrap_err().kind(), ErrorKind::Lookup);
        assert_eq!(table.label_of(2).unwrap_err().kind(), ErrorKind::Lookup);
    }

    #[test]
    fn test_duplicates_are_rejected() {
        let err = ClassTable::new(["car", "car"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_from_file_ignores_trailing_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.txt");
        fs::write(&path, "car\r\nperson\n\n").unwrap();
        let table = ClassTable::from_file(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.index_of("person").unwrap(), 1);
    }

    #[test]
    fn test_from_file_keeps_interior_blank_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classes.txt");
        fs::write(&path, "car\n\nperson\n").unwrap();
        let table = ClassTable::from_file(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.label_of(1).unwrap(), "");
        assert_eq!(table.index_of("person").unwrap(), 2);
    }
}
