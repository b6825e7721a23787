//! Filename decoding: one dataset basename to an ordered field map.
//!
//! Basenames alternate `key-value` tokens separated by `-` and `_`, ending in
//! a bare suffix token and an extension (`sub-1_ses-2_task-mid_bold.nii.gz`).
//! The decoder expands on-disk abbreviations to canonical field names and,
//! when the catalog detects exactly one file type, namespaces that type's own
//! labels with a `{type}_` prefix so fields from different file types can
//! coexist in one group.

use std::path::Path;

use indexmap::IndexMap;

use crate::catalog::{FileTypeCatalog, FileTypeMatch, KeyNames};
use crate::constants::filename::{
    EXTENSION_KEY, FIELD_SEP, KEY_VALUE_SEP, SUBJECT_KEY, SUFFIX_KEY,
};
use crate::errors::ConfigError;
use crate::types::{Constraints, FieldName, FileTypeName, Label};

/// A decoded basename: canonical fields in filename order, plus the catalog
/// detection outcome for the whole name.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedName {
    /// Field names to raw values, in the order they appear in the name.
    pub fields: IndexMap<FieldName, String>,
    /// File-type detection result; ambiguity is surfaced, never guessed away.
    pub file_type: FileTypeMatch,
}

/// Decode the basename of `path` into canonical fields.
///
/// The final token is split at its first `.` into the implicit `suffix` field
/// and the `extension` field. With `add_prefix` set and an unambiguous file
/// type, every field the detected type declares is renamed to
/// `{type}_{field}`; `subject`, `session`, and `extension` belong to no
/// single type and keep their bare names.
pub fn decode_filename(
    path: &Path,
    keynames: &KeyNames,
    catalog: &FileTypeCatalog,
    add_prefix: bool,
) -> Result<DecodedName, ConfigError> {
    let basename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| ConfigError::Value {
            label: path.display().to_string(),
            details: "path has no UTF-8 basename".to_string(),
        })?;

    let mut tokens: Vec<String> = basename
        .split([KEY_VALUE_SEP, FIELD_SEP])
        .map(str::to_string)
        .collect();
    let Some(final_token) = tokens.pop() else {
        return Err(ConfigError::Value {
            label: basename.to_string(),
            details: "empty filename".to_string(),
        });
    };
    let Some((suffix_value, extension)) = final_token.split_once('.') else {
        return Err(ConfigError::Value {
            label: basename.to_string(),
            details: format!("'{final_token}' has no extension"),
        });
    };
    tokens.push(SUFFIX_KEY.to_string());
    tokens.push(suffix_value.to_string());
    if tokens.len() % 2 != 0 {
        return Err(ConfigError::Value {
            label: basename.to_string(),
            details: "expected alternating key-value tokens".to_string(),
        });
    }

    let mut fields: IndexMap<FieldName, String> = IndexMap::new();
    for pair in tokens.chunks_exact(2) {
        fields.insert(pair[0].clone(), pair[1].clone());
    }
    fields.insert(EXTENSION_KEY.to_string(), extension.to_string());
    let fields = keynames.expand_keys(&fields)?;

    let file_type = catalog.detect(basename);
    let fields = if add_prefix
        && let FileTypeMatch::Unique(type_name) = &file_type
        && let Some(spec) = catalog.get(type_name)
    {
        let mut prefixed = IndexMap::new();
        for (field, value) in fields {
            if spec.labels.all.iter().any(|label| label == &field) {
                prefixed.insert(format!("{type_name}{FIELD_SEP}{field}"), value);
            } else {
                prefixed.insert(field, value);
            }
        }
        prefixed
    } else {
        fields
    };

    Ok(DecodedName { fields, file_type })
}

/// Number of distinct field combinations one subject is expected to produce.
///
/// The `subject` entry is dropped; every other entry contributes a factor
/// equal to its option count. An empty constraint map therefore yields 1.
pub fn expected_combinations(constraints: &Constraints) -> usize {
    constraints
        .iter()
        .filter(|(field, _)| field.as_str() != SUBJECT_KEY)
        .map(|(_, options)| options.len())
        .product()
}

/// Distinct catalog file types named by label prefixes, in catalog order.
///
/// The prefix of a label is the segment before its first `_`; labels without
/// one (`subject`, `session`) name no type. Prefixes naming no catalog entry
/// are ignored.
pub fn active_file_types(labels: &[Label], catalog: &FileTypeCatalog) -> Vec<FileTypeName> {
    let mut present: Vec<&str> = Vec::new();
    for label in labels {
        if let Some((prefix, _)) = label.split_once(FIELD_SEP)
            && !present.contains(&prefix)
        {
            present.push(prefix);
        }
    }
    catalog
        .iter()
        .filter(|(name, _)| present.contains(&name.as_str()))
        .map(|(name, _)| name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::fixtures::{ANAT_NAME, FUNC_BOLD_NAME, PHYSIO_NAME};

    fn decode(name: &str, add_prefix: bool) -> DecodedName {
        decode_filename(
            Path::new(name),
            KeyNames::builtin(),
            FileTypeCatalog::builtin(),
            add_prefix,
        )
        .unwrap()
    }

    fn pairs(decoded: &DecodedName) -> Vec<(&str, &str)> {
        decoded
            .fields
            .iter()
            .map(|(field, value)| (field.as_str(), value.as_str()))
            .collect()
    }

    #[test]
    fn functional_name_decodes_with_type_prefixes() {
        let decoded = decode(FUNC_BOLD_NAME, true);
        assert_eq!(
            decoded.file_type,
            FileTypeMatch::Unique("func".to_string())
        );
        assert_eq!(
            pairs(&decoded),
            vec![
                ("subject", "1"),
                ("session", "2"),
                ("func_task", "mid"),
                ("func_acquisition", "multiband"),
                ("func_run", "1"),
                ("func_suffix", "bold"),
                ("extension", "nii.gz"),
            ]
        );
    }

    #[test]
    fn prefixes_are_optional() {
        let decoded = decode(FUNC_BOLD_NAME, false);
        assert_eq!(
            pairs(&decoded),
            vec![
                ("subject", "1"),
                ("session", "2"),
                ("task", "mid"),
                ("acquisition", "multiband"),
                ("run", "1"),
                ("suffix", "bold"),
                ("extension", "nii.gz"),
            ]
        );
    }

    #[test]
    fn physio_name_keeps_shared_fields_bare() {
        let decoded = decode(PHYSIO_NAME, true);
        assert_eq!(
            pairs(&decoded),
            vec![
                ("subject", "1"),
                ("session", "2"),
                ("physio_task", "mid"),
                ("physio_run", "1"),
                ("physio_recording", "cardiac"),
                ("physio_suffix", "physio"),
                ("extension", "tsv.gz"),
            ]
        );
    }

    #[test]
    fn minimal_anatomical_name_decodes() {
        let decoded = decode(ANAT_NAME, true);
        assert_eq!(
            pairs(&decoded),
            vec![
                ("subject", "1"),
                ("anat_suffix", "T1w"),
                ("extension", "nii.gz"),
            ]
        );
    }

    #[test]
    fn missing_extension_is_rejected() {
        let err = decode_filename(
            Path::new("sub-1_bold"),
            KeyNames::builtin(),
            FileTypeCatalog::builtin(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Value { .. }));
    }

    #[test]
    fn unbalanced_tokens_are_rejected() {
        let err = decode_filename(
            Path::new("sub-1_ses-2_extra_bold.nii.gz"),
            KeyNames::builtin(),
            FileTypeCatalog::builtin(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Value { .. }));
    }

    #[test]
    fn combination_count_multiplies_options_without_subject() {
        let mut constraints = Constraints::new();
        constraints.insert("subject".to_string(), vec!["1".into(), "2".into()]);
        constraints.insert("task".to_string(), vec!["mid".into()]);
        constraints.insert(
            "run".to_string(),
            vec!["1".into(), "2".into(), "3".into()],
        );
        constraints.insert("session".to_string(), vec!["a".into(), "b".into()]);
        constraints.insert("extension".to_string(), vec!["nii.gz".into()]);
        assert_eq!(expected_combinations(&constraints), 6);
    }

    #[test]
    fn no_constraints_expect_one_file() {
        assert_eq!(expected_combinations(&Constraints::new()), 1);
    }

    #[test]
    fn active_types_follow_catalog_order() {
        let labels = vec![
            "physio_recording".to_string(),
            "func_task".to_string(),
            "subject".to_string(),
            "anat_suffix".to_string(),
            "nonsense_x".to_string(),
        ];
        let active = active_file_types(&labels, FileTypeCatalog::builtin());
        assert_eq!(active, vec!["anat", "func", "physio"]);
    }
}
