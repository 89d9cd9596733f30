//! Per-image label consistency checks that gate batch exports.
//!
//! An image fails when a label repeats, or when its labels fall into two or more
//! conflict groups (mutually exclusive renderings of one physical component).
//! Any number of labels from a single group, such as a part and its cover, is fine.

use log::{error, info};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};
use crate::io::list_files_with_extension;
use crate::utils::read_record;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictGroup {
    pub name: String,
    members: HashSet<String>,
}

impl ConflictGroup {
    pub fn new<I, S>(name: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, label: &str) -> bool {
        self.members.contains(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictCatalog {
    groups: Vec<ConflictGroup>,
}

impl Default for ConflictCatalog {
    fn default() -> Self {
        Self::new(vec![
            ConflictGroup::new(
                "antenna",
                [
                    "Antenna",
                    "Antenna-Cover",
                    "1001-02A",
                    "1001-02A-Cover",
                    "1005-02C-1A",
                    "1005-02C-1A-Cover",
                    "1005-03C-1A",
                    "1005-03C-1A-QRPanel",
                    "2006-01C-1A",
                    "2006-01C-1A-QRPanel",
                    "2006-01C-2A",
                    "2006-01C-2A-Cover",
                ],
            ),
            ConflictGroup::new(
                "placeholder",
                [
                    "placeholder-front",
                    "placeholder-front-Cover",
                    "1001-03A",
                    "1001-03A-Cover",
                    "1001-04A",
                    "1001-04A-QRPanel",
                    "1006-02C-1A",
                    "1006-02C-1A-Cover",
                    "2007-01A",
                    "2007-01A-Cover",
                    "placeholder-tail",
                    "placeholder-tail-Cover",
                    "3002-06C",
                    "3002-06C-Cover",
                ],
            ),
        ])
    }
}

/// Outcome of checking one image's labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelCheck {
    /// Labels occurring more than once, in order of first repetition.
    pub duplicates: Vec<String>,
    /// Names of the conflict groups hit when more than one is hit.
    pub conflicting_groups: Vec<String>,
}

impl LabelCheck {
    pub fn is_valid(&self) -> bool {
        self.duplicates.is_empty() && self.conflicting_groups.is_empty()
    }
}

/// A file that failed validation and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileValidation {
    pub path: PathBuf,
    pub check: LabelCheck,
}

impl ConflictCatalog {
    pub fn new(groups: Vec<ConflictGroup>) -> Self {
        Self { groups }
    }

    pub fn groups(&self) -> &[ConflictGroup] {
        &self.groups
    }

    /// Run both checks over one image's labels.
    pub fn check<S: AsRef<str>>(&self, labels: &[S]) -> LabelCheck {
        LabelCheck {
            duplicates: find_duplicates(labels),
            conflicting_groups: self.find_conflicts(labels),
        }
    }

    pub fn validate<S: AsRef<str>>(&self, labels: &[S]) -> bool {
        self.check(labels).is_valid()
    }

    fn find_conflicts<S: AsRef<str>>(&self, labels: &[S]) -> Vec<String> {
        let touched: BTreeSet<usize> = labels
            .iter()
            .flat_map(|label| {
                self.groups
                    .iter()
                    .enumerate()
                    .filter(move |(_, group)| group.contains(label.as_ref()))
                    .map(|(index, _)| index)
            })
            .collect();
        if touched.len() < 2 {
            return Vec::new();
        }
        touched
            .into_iter()
            .map(|index| self.groups[index].name.clone())
            .collect()
    }
}

fn find_duplicates<S: AsRef<str>>(labels: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    for label in labels.iter().map(AsRef::as_ref) {
        if !seen.insert(label) && !duplicates.iter().any(|d| d == label) {
            duplicates.push(label.to_string());
        }
    }
    duplicates
}

/// Check every record in `files`, returning all failures in input order.
///
/// Unreadable or malformed records are errors, not validation failures.
pub fn validate_batch(
    files: &[PathBuf],
    catalog: &ConflictCatalog,
) -> Result<Vec<FileValidation>> {
    let mut failures = Vec::new();
    for path in files {
        let record = read_record(path)?;
        let check = catalog.check(&record.labels());
        if !check.is_valid() {
            failures.push(FileValidation {
                path: path.clone(),
                check,
            });
        }
    }
    Ok(failures)
}

/// Validate every `*.json` record in `dir`. Each failing file is logged, then a
/// single [`ConvertError::Validation`] carrying all of them is returned.
pub fn ensure_valid_dir(dir: &Path, catalog: &ConflictCatalog) -> Result<()> {
    let files = list_files_with_extension(dir, "json")?;
    let failures = validate_batch(&files, catalog)?;
    if failures.is_empty() {
        info!("Validated labels of {} file(s)", files.len());
        return Ok(());
    }
    for failure in &failures {
        error!(
            "Validate file failed: {} (duplicates: {:?}, conflicting groups: {:?})",
            failure.path.display(),
            failure.check.duplicates,
            failure.check.conflicting_groups
        );
    }
    Err(ConvertError::Validation { failures })
}
