//! Filename-template helpers: field extraction, validation against declared
//! labels, and derivation of per-type default templates.
//!
//! Templates use `{field}` substitution syntax. A doubled brace (`{{`, `}}`)
//! is a literal brace; an empty `{}` contributes nothing.

use indexmap::IndexMap;

use crate::catalog::{FileTypeCatalog, KeyNames};
use crate::constants::filename::{FIELD_SEP, KEY_VALUE_SEP, SESSION_KEY, SUBJECT_KEY, SUFFIX_KEY};
use crate::errors::ConfigError;
use crate::types::{FieldName, Label, TemplateText};
use crate::utils::multireplace;

/// Extract the substitution field names of a template, in order.
///
/// A lone `}`, an unterminated `{`, or a field name containing anything other
/// than word characters is a value error.
pub fn template_fields(template: &str) -> Result<Vec<FieldName>, ConfigError> {
    let mut fields = Vec::new();
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '{' => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    name.push(inner);
                }
                if !closed {
                    return Err(ConfigError::Value {
                        label: template.to_string(),
                        details: "unterminated '{' in template".to_string(),
                    });
                }
                if name.is_empty() {
                    continue;
                }
                if !is_field_name(&name) {
                    return Err(ConfigError::Value {
                        label: template.to_string(),
                        details: format!("'{{{name}}}' is not a valid template field"),
                    });
                }
                fields.push(name);
            }
            '}' => {
                if chars.peek() == Some(&'}') {
                    chars.next();
                    continue;
                }
                return Err(ConfigError::Value {
                    label: template.to_string(),
                    details: "single '}' encountered in template".to_string(),
                });
            }
            _ => {}
        }
    }
    Ok(fields)
}

/// Whether every field of `template` names one of the declared labels.
///
/// Returns `Ok(false)` for a template without any substitution field; a
/// malformed template is an error rather than `false`.
pub fn fields_are_declared(template: &str, declared: &[Label]) -> Result<bool, ConfigError> {
    let fields = template_fields(template)?;
    if fields.is_empty() {
        return Ok(false);
    }
    Ok(fields
        .iter()
        .all(|field| declared.iter().any(|label| label == field)))
}

/// Derive one default filename template per file type active in `declared`.
///
/// Labels are taken in `valid_order` where given (insertion order otherwise),
/// restricted per type to `subject`, `session`, and the type's own prefixed
/// labels. A label containing `suffix` becomes a bare `{label}` token; every
/// other label becomes `abbrev-{label}` with the type prefix stripped and the
/// canonical name abbreviated. Types whose restriction leaves no labels are
/// skipped.
///
/// Returned entries are keyed `{type}Prefix`, ready to install as template
/// wildcards.
pub fn default_templates(
    declared: &[Label],
    valid_order: Option<&[Label]>,
    keynames: &KeyNames,
    catalog: &FileTypeCatalog,
) -> Result<IndexMap<Label, TemplateText>, ConfigError> {
    let ordered: Vec<Label> = match valid_order {
        Some(order) => order
            .iter()
            .filter(|label| declared.contains(*label))
            .cloned()
            .collect(),
        None => declared.to_vec(),
    };

    let mut templates = IndexMap::new();
    for file_type in crate::filename::active_file_types(declared, catalog) {
        let prefix = format!("{file_type}{FIELD_SEP}");
        let mut abbreviations: IndexMap<String, String> = IndexMap::new();
        abbreviations.insert(prefix.clone(), String::new());
        for (canonical, abbreviation) in keynames.abbreviation_map() {
            abbreviations.insert(canonical.clone(), abbreviation.clone());
        }

        let mut pieces = Vec::new();
        for label in &ordered {
            let relevant = label == SUBJECT_KEY
                || label == SESSION_KEY
                || label.starts_with(prefix.as_str());
            if !relevant {
                continue;
            }
            if label.contains(SUFFIX_KEY) {
                pieces.push(format!("{{{label}}}"));
            } else {
                let abbreviated = multireplace(label, &abbreviations, false)?;
                pieces.push(format!("{abbreviated}{KEY_VALUE_SEP}{{{label}}}"));
            }
        }
        if pieces.is_empty() {
            continue;
        }
        let separator = FIELD_SEP.to_string();
        templates.insert(
            format!("{file_type}Prefix"),
            pieces.join(separator.as_str()),
        );
    }
    Ok(templates)
}

fn is_field_name(name: &str) -> bool {
    name.chars()
        .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
