//! Dataset-index capability consumed by subject resolution.
//!
//! An index answers two questions about a dataset tree: which subjects exist,
//! and which files match a set of decoded-field constraints. The resolver
//! only ever talks to these traits, so a slow network-backed index and the
//! in-memory double below are interchangeable.

mod directory;

use std::sync::Arc;

use indexmap::IndexMap;

use crate::catalog::{FileTypeCatalog, KeyNames};
use crate::constants::filename::SUBJECT_KEY;
use crate::errors::ConfigError;
use crate::filename::decode_filename;
use crate::types::{Constraints, FieldName, MetadataMap, SubjectId};

pub use directory::{DirectoryFile, DirectoryIndex};

/// One file surfaced by an index query.
pub trait DatasetFile: Send + Sync {
    /// Path of the file inside the dataset tree.
    fn path(&self) -> &str;

    /// Sidecar metadata for the file.
    ///
    /// May fail per file; callers decide whether a failure is fatal. The
    /// resolver treats fieldmap metadata failures as non-fatal and counts
    /// the file anyway.
    fn metadata(&self) -> Result<MetadataMap, ConfigError>;
}

/// Constraint-query capability over a dataset tree.
///
/// Implementations are read-only and must tolerate concurrent queries.
/// Backends with slow storage decide their own retry and timeout policy;
/// callers impose none.
pub trait DatasetIndex: Send + Sync {
    /// Distinct subject identifiers among files matching `constraints`,
    /// sorted lexicographically.
    fn subjects(&self, constraints: &Constraints) -> Result<Vec<SubjectId>, ConfigError>;

    /// Files whose decoded fields satisfy every constraint.
    fn query(&self, constraints: &Constraints) -> Result<Vec<Arc<dyn DatasetFile>>, ConfigError>;
}

/// Whether decoded `fields` satisfy every entry of `constraints`.
///
/// A constrained field must be present and equal one of its options; files
/// lacking the field are excluded.
pub fn matches_constraints(
    fields: &IndexMap<FieldName, String>,
    constraints: &Constraints,
) -> bool {
    constraints.iter().all(|(field, options)| {
        fields
            .get(field)
            .is_some_and(|value| options.iter().any(|option| option == value))
    })
}

/// One file held by [`InMemoryIndex`].
#[derive(Clone, Debug)]
pub struct InMemoryFile {
    path: String,
    metadata: Option<MetadataMap>,
}

impl InMemoryFile {
    /// A file with no sidecar metadata; [`DatasetFile::metadata`] will fail.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            metadata: None,
        }
    }

    /// A file with recorded sidecar metadata.
    pub fn with_metadata(path: impl Into<String>, metadata: MetadataMap) -> Self {
        Self {
            path: path.into(),
            metadata: Some(metadata),
        }
    }
}

impl DatasetFile for InMemoryFile {
    fn path(&self) -> &str {
        &self.path
    }

    fn metadata(&self) -> Result<MetadataMap, ConfigError> {
        self.metadata.clone().ok_or_else(|| ConfigError::Index {
            reason: format!("no metadata recorded for '{}'", self.path),
        })
    }
}

/// Deterministic in-memory index over a fixed file list.
///
/// Paths are decoded with the built-in resources at query time, exactly as
/// the directory-backed index decodes scanned files.
#[derive(Clone, Debug, Default)]
pub struct InMemoryIndex {
    files: Vec<Arc<InMemoryFile>>,
}

impl InMemoryIndex {
    /// Build an index over the given files, kept in the given order.
    pub fn new(files: Vec<InMemoryFile>) -> Self {
        Self {
            files: files.into_iter().map(Arc::new).collect(),
        }
    }

    fn decoded_fields(&self, file: &InMemoryFile) -> Option<IndexMap<FieldName, String>> {
        decode_filename(
            std::path::Path::new(&file.path),
            KeyNames::builtin(),
            FileTypeCatalog::builtin(),
            false,
        )
        .ok()
        .map(|decoded| decoded.fields)
    }
}

impl DatasetIndex for InMemoryIndex {
    fn subjects(&self, constraints: &Constraints) -> Result<Vec<SubjectId>, ConfigError> {
        let mut subjects: Vec<SubjectId> = Vec::new();
        for file in &self.files {
            let Some(fields) = self.decoded_fields(file) else {
                continue;
            };
            if !matches_constraints(&fields, constraints) {
                continue;
            }
            if let Some(subject) = fields.get(SUBJECT_KEY)
                && !subjects.iter().any(|seen| seen == subject)
            {
                subjects.push(subject.clone());
            }
        }
        subjects.sort();
        Ok(subjects)
    }

    fn query(&self, constraints: &Constraints) -> Result<Vec<Arc<dyn DatasetFile>>, ConfigError> {
        let mut matched: Vec<Arc<dyn DatasetFile>> = Vec::new();
        for file in &self.files {
            let Some(fields) = self.decoded_fields(file) else {
                continue;
            };
            if matches_constraints(&fields, constraints) {
                matched.push(Arc::clone(file) as Arc<dyn DatasetFile>);
            }
        }
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraints(entries: &[(&str, &[&str])]) -> Constraints {
        let mut map = Constraints::new();
        for (field, options) in entries {
            map.insert(
                field.to_string(),
                options.iter().map(|option| option.to_string()).collect(),
            );
        }
        map
    }

    fn sample_index() -> InMemoryIndex {
        InMemoryIndex::new(vec![
            InMemoryFile::new("sub-1/func/sub-1_task-mid_run-1_bold.nii.gz"),
            InMemoryFile::new("sub-1/func/sub-1_task-mid_run-2_bold.nii.gz"),
            InMemoryFile::new("sub-2/func/sub-2_task-mid_run-1_bold.nii.gz"),
            InMemoryFile::new("sub-2/anat/sub-2_T1w.nii.gz"),
            InMemoryFile::new("stray-file"),
        ])
    }

    #[test]
    fn subjects_are_distinct_and_sorted() {
        let index = sample_index();
        let subjects = index.subjects(&Constraints::new()).unwrap();
        assert_eq!(subjects, vec!["1", "2"]);
    }

    #[test]
    fn queries_filter_on_every_constraint() {
        let index = sample_index();
        let matched = index
            .query(&constraints(&[
                ("task", &["mid"]),
                ("run", &["1"]),
                ("extension", &["nii.gz"]),
            ]))
            .unwrap();
        let paths: Vec<&str> = matched.iter().map(|file| file.path()).collect();
        assert_eq!(
            paths,
            vec![
                "sub-1/func/sub-1_task-mid_run-1_bold.nii.gz",
                "sub-2/func/sub-2_task-mid_run-1_bold.nii.gz",
            ]
        );
    }

    #[test]
    fn multiple_options_widen_a_constraint() {
        let index = sample_index();
        let matched = index
            .query(&constraints(&[("run", &["1", "2"]), ("subject", &["1"])]))
            .unwrap();
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn constrained_fields_must_be_present() {
        let index = sample_index();
        // The anatomical file has no task field, so it never matches a task
        // constraint.
        let matched = index.query(&constraints(&[("task", &["mid"])])).unwrap();
        assert_eq!(matched.len(), 3);
    }

    #[test]
    fn missing_metadata_is_an_error() {
        let file = InMemoryFile::new("sub-1/fmap/sub-1_phasediff.nii.gz");
        let err = file.metadata().unwrap_err();
        assert!(matches!(err, ConfigError::Index { .. }));

        let mut metadata = MetadataMap::new();
        metadata.insert("IntendedFor".to_string(), serde_json::json!(["x"]));
        let file = InMemoryFile::with_metadata("sub-1/fmap/sub-1_phasediff.nii.gz", metadata);
        assert!(file.metadata().is_ok());
    }
}
