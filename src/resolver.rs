//! Subject resolution: finding the subjects that own a complete set of
//! expected files.
//!
//! One pass queries the index per active file type, counts matching files
//! per subject, and compares each subject's tally against the number of
//! field combinations the dataset group declares. Fieldmaps and physio
//! recordings are cross-checked against the imaging files seen earlier in
//! the pass, so they always run last regardless of catalog order.

use std::path::Path;

use chrono::Local;
use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::catalog::{FileTypeCatalog, KeyNames};
use crate::constants::filename::{EXTENSION_KEY, FIELD_SEP, SESSION_KEY, SUBJECT_KEY};
use crate::constants::groups::DATASET_GROUP;
use crate::constants::resolver::{
    FIELDMAP_TYPE, IMAGING_EXTENSION, IMAGING_TYPES, INTENDED_FOR_KEY, LOG_TIME_FORMAT,
    PHYSIO_EXTENSION, PHYSIO_TYPE,
};
use crate::errors::ConfigError;
use crate::filename::{active_file_types, decode_filename, expected_combinations};
use crate::index::{DatasetFile, DatasetIndex};
use crate::model::ConfigModel;
use crate::types::{Constraints, FileTypeName, Label, LogLine, SubjectId};
use crate::value::{Scalar, Value};

/// One subject dropped during resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExcludedSubject {
    /// Subject identifier.
    pub subject: SubjectId,
    /// Files observed across all active file types.
    pub observed: usize,
    /// Files expected across all active file types.
    pub expected: usize,
}

/// Outcome of one resolution pass.
#[derive(Clone, Debug)]
pub struct ResolutionReport {
    /// Subjects with a complete file set, sorted, also written back to the
    /// dataset group's `subject` wildcard.
    pub retained: Vec<SubjectId>,
    /// Subjects dropped, with their counts.
    pub excluded: Vec<ExcludedSubject>,
    /// Files each subject was expected to own, summed over active types.
    pub expected_per_subject: usize,
    /// Human-readable trace of the pass.
    pub log: Vec<LogLine>,
}

/// Resolves the subject wildcard of a model against a dataset index.
pub struct SubjectResolver<'a> {
    index: &'a dyn DatasetIndex,
    keynames: &'a KeyNames,
    catalog: &'a FileTypeCatalog,
}

impl<'a> SubjectResolver<'a> {
    /// Create a resolver over an index with explicit filename resources.
    pub fn new(
        index: &'a dyn DatasetIndex,
        keynames: &'a KeyNames,
        catalog: &'a FileTypeCatalog,
    ) -> Self {
        Self {
            index,
            keynames,
            catalog,
        }
    }

    /// Retain the subjects whose file tally matches the declared
    /// expectations, writing them into the dataset group's `subject`
    /// wildcard.
    ///
    /// Candidate subjects come from a session-constrained index query; any
    /// `subject` values declared beforehand are superseded by that pool.
    /// Every candidate, including those with zero files, shows up in the
    /// report.
    pub fn resolve(&self, model: &mut ConfigModel) -> Result<ResolutionReport, ConfigError> {
        let dataset = model.group(DATASET_GROUP)?;
        let mut declared: IndexMap<Label, Vec<String>> = IndexMap::new();
        for wildcard in dataset.iter() {
            if let Some(value) = wildcard.value() {
                declared.insert(wildcard.label().to_string(), value.render_all());
            }
        }
        let ordered = self.ordered_active_types(&dataset.labels());

        let mut log: Vec<LogLine> = Vec::new();
        let mut session_constraints = Constraints::new();
        if let Some(options) = declared.get(SESSION_KEY) {
            session_constraints.insert(SESSION_KEY.to_string(), options.clone());
        }
        log.push(format!(
            "[{}]: querying dataset index for subjects...",
            Local::now().format(LOG_TIME_FORMAT)
        ));
        let candidates = self.index.subjects(&session_constraints)?;
        debug!(
            "[bidsvars:resolver] {} candidate subject(s), {} active file type(s)",
            candidates.len(),
            ordered.len()
        );

        let mut counts: IndexMap<SubjectId, usize> = candidates
            .iter()
            .map(|subject| (subject.clone(), 0))
            .collect();
        let mut expected_total = 0usize;
        let mut imaging_paths: Vec<String> = Vec::new();

        for file_type in &ordered {
            let constraints = type_constraints(file_type, &declared, &candidates);
            log.push(format!(
                "[{}]: querying dataset index for {file_type} files...",
                Local::now().format(LOG_TIME_FORMAT)
            ));
            let files = self.index.query(&constraints)?;
            expected_total += expected_combinations(&constraints);
            debug!(
                "[bidsvars:resolver] {} {file_type} file(s) matched",
                files.len()
            );

            if file_type == FIELDMAP_TYPE {
                for file in &files {
                    if self.fieldmap_applies(file.as_ref(), &imaging_paths) {
                        self.count_subject(file.path(), &mut counts);
                    }
                }
            } else if file_type == PHYSIO_TYPE {
                // A physio recording belongs to an imaging file when that
                // file's name, minus its final suffix token, occurs within
                // the physio path.
                let stems: Vec<&str> = imaging_paths
                    .iter()
                    .filter_map(|path| path.rfind(FIELD_SEP).map(|idx| &path[..idx]))
                    .collect();
                for file in &files {
                    if stems.iter().any(|stem| file.path().contains(stem)) {
                        self.count_subject(file.path(), &mut counts);
                    }
                }
            } else {
                for file in &files {
                    imaging_paths.push(file.path().to_string());
                    self.count_subject(file.path(), &mut counts);
                }
            }
        }

        let mut retained: Vec<SubjectId> = Vec::new();
        let mut excluded: Vec<ExcludedSubject> = Vec::new();
        for (subject, observed) in &counts {
            if *observed == expected_total {
                retained.push(subject.clone());
            } else {
                log.push(format!(
                    "subject {subject} not included. Has {observed} of {expected_total} required files."
                ));
                warn!(
                    "[bidsvars:resolver] subject {subject} excluded ({observed} of {expected_total} files)"
                );
                excluded.push(ExcludedSubject {
                    subject: subject.clone(),
                    observed: *observed,
                    expected: expected_total,
                });
            }
        }
        retained.sort();

        let value = Value::Many(
            retained
                .iter()
                .map(|subject| Scalar::from(subject.as_str()))
                .collect(),
        );
        model
            .group_mut(DATASET_GROUP)?
            .get_mut(SUBJECT_KEY)?
            .set_value(value)?;

        Ok(ResolutionReport {
            retained,
            excluded,
            expected_per_subject: expected_total,
            log,
        })
    }

    /// Active types in catalog order, with the cross-checking types moved to
    /// the back (fieldmaps before physio) so the imaging pool is complete
    /// when they run.
    fn ordered_active_types(&self, labels: &[Label]) -> Vec<FileTypeName> {
        let active = active_file_types(labels, self.catalog);
        let special = [FIELDMAP_TYPE, PHYSIO_TYPE];
        let mut ordered: Vec<FileTypeName> = active
            .iter()
            .filter(|name| !special.contains(&name.as_str()))
            .cloned()
            .collect();
        for name in special {
            if active.iter().any(|candidate| candidate == name) {
                ordered.push(name.to_string());
            }
        }
        ordered
    }

    /// Whether a fieldmap's metadata points at an imaging file seen this
    /// pass. Unreadable metadata or a missing key counts the file anyway;
    /// dropping data over a sidecar problem is worse than over-counting.
    fn fieldmap_applies(&self, file: &dyn DatasetFile, imaging_paths: &[String]) -> bool {
        let metadata = match file.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(
                    "[bidsvars:resolver] metadata for {} unavailable; counting it anyway: {err}",
                    file.path()
                );
                return true;
            }
        };
        match metadata.get(INTENDED_FOR_KEY) {
            None => true,
            Some(serde_json::Value::Array(intended)) => intended
                .iter()
                .filter_map(|entry| entry.as_str())
                .any(|target| imaging_paths.iter().any(|seen| seen.contains(target))),
            Some(serde_json::Value::String(target)) => imaging_paths
                .iter()
                .any(|seen| seen.contains(target.as_str())),
            Some(_) => true,
        }
    }

    fn count_subject(&self, path: &str, counts: &mut IndexMap<SubjectId, usize>) {
        match decode_filename(Path::new(path), self.keynames, self.catalog, false) {
            Ok(decoded) => match decoded.fields.get(SUBJECT_KEY) {
                Some(subject) => *counts.entry(subject.clone()).or_insert(0) += 1,
                None => debug!("[bidsvars:resolver] no subject field in {path}; not counted"),
            },
            Err(err) => debug!("[bidsvars:resolver] cannot decode {path}: {err}"),
        }
    }
}

/// Constraint map for one file type: declared `subject`/`session` values plus
/// the type's own labels with their prefix stripped, the candidate pool as
/// the subject constraint, and the extension the type stores.
fn type_constraints(
    file_type: &str,
    declared: &IndexMap<Label, Vec<String>>,
    candidates: &[SubjectId],
) -> Constraints {
    let prefix = format!("{file_type}{FIELD_SEP}");
    let mut constraints = Constraints::new();
    for (label, options) in declared {
        if label == SUBJECT_KEY || label == SESSION_KEY {
            constraints.insert(label.clone(), options.clone());
        } else if let Some(stripped) = label.strip_prefix(prefix.as_str()) {
            constraints.insert(stripped.to_string(), options.clone());
        }
    }
    constraints.insert(SUBJECT_KEY.to_string(), candidates.to_vec());
    if IMAGING_TYPES.contains(&file_type) {
        constraints.insert(
            EXTENSION_KEY.to_string(),
            vec![IMAGING_EXTENSION.to_string()],
        );
    } else if file_type == PHYSIO_TYPE {
        constraints.insert(
            EXTENSION_KEY.to_string(),
            vec![PHYSIO_EXTENSION.to_string()],
        );
    }
    constraints
}
