//! Directory-backed dataset index.
//!
//! The tree is walked once at open time in deterministic name order; queries
//! run against the decoded snapshot. Sidecar metadata is read lazily, one
//! JSON file per data file, so a dataset with thousands of sidecars costs
//! nothing until a fieldmap cross-check actually asks.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;
use walkdir::WalkDir;

use crate::catalog::{FileTypeCatalog, KeyNames};
use crate::constants::filename::SUBJECT_KEY;
use crate::errors::ConfigError;
use crate::filename::decode_filename;
use crate::index::{DatasetFile, DatasetIndex, matches_constraints};
use crate::types::{Constraints, FieldName, MetadataMap, SubjectId};

const SIDECAR_SUFFIX: &str = ".json";

/// One scanned file with its decoded fields and probable sidecar path.
#[derive(Clone, Debug)]
pub struct DirectoryFile {
    path: String,
    fields: IndexMap<FieldName, String>,
    sidecar: PathBuf,
}

impl DatasetFile for DirectoryFile {
    fn path(&self) -> &str {
        &self.path
    }

    fn metadata(&self) -> Result<MetadataMap, ConfigError> {
        let text = fs::read_to_string(&self.sidecar)?;
        match serde_json::from_str(&text)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(ConfigError::Index {
                reason: format!(
                    "sidecar {} is not a JSON object",
                    self.sidecar.display()
                ),
            }),
        }
    }
}

/// Index over one dataset directory tree.
#[derive(Debug)]
pub struct DirectoryIndex {
    root: PathBuf,
    files: Vec<Arc<DirectoryFile>>,
}

impl DirectoryIndex {
    /// Walk `root` and index every decodable file.
    ///
    /// Sidecar JSON files are never indexed as data; files whose names do
    /// not decode are skipped rather than failing the whole scan.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ConfigError::PathNotExist { path: root });
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|err| ConfigError::Index {
                reason: format!("walking {}: {err}", root.display()),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(basename) = entry.file_name().to_str() else {
                continue;
            };
            if basename.ends_with(SIDECAR_SUFFIX) {
                continue;
            }
            let decoded = match decode_filename(
                entry.path(),
                KeyNames::builtin(),
                FileTypeCatalog::builtin(),
                false,
            ) {
                Ok(decoded) => decoded,
                Err(_) => {
                    debug!("[bidsvars:index] skipping undecodable file {basename}");
                    continue;
                }
            };
            files.push(Arc::new(DirectoryFile {
                path: entry.path().display().to_string(),
                fields: decoded.fields,
                sidecar: sidecar_path(entry.path(), basename),
            }));
        }
        debug!(
            "[bidsvars:index] indexed {} file(s) under {}",
            files.len(),
            root.display()
        );
        Ok(Self { root, files })
    }

    /// The indexed root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of indexed files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the scan found no decodable files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl DatasetIndex for DirectoryIndex {
    fn subjects(&self, constraints: &Constraints) -> Result<Vec<SubjectId>, ConfigError> {
        let mut subjects: Vec<SubjectId> = Vec::new();
        for file in &self.files {
            if !matches_constraints(&file.fields, constraints) {
                continue;
            }
            if let Some(subject) = file.fields.get(SUBJECT_KEY)
                && !subjects.iter().any(|seen| seen == subject)
            {
                subjects.push(subject.clone());
            }
        }
        subjects.sort();
        Ok(subjects)
    }

    fn query(&self, constraints: &Constraints) -> Result<Vec<Arc<dyn DatasetFile>>, ConfigError> {
        Ok(self
            .files
            .iter()
            .filter(|file| matches_constraints(&file.fields, constraints))
            .map(|file| Arc::clone(file) as Arc<dyn DatasetFile>)
            .collect())
    }
}

/// Sidecar path convention: the basename up to its first `.`, with a `.json`
/// extension, in the same directory.
fn sidecar_path(path: &Path, basename: &str) -> PathBuf {
    let stem = basename.split('.').next().unwrap_or(basename);
    path.with_file_name(format!("{stem}{SIDECAR_SUFFIX}"))
}
