//! The configuration model: named, ordered wildcard groups with JSON
//! persistence.
//!
//! A persisted document has exactly one top-level key, the model name; its
//! value maps group names to group objects. Loading revalidates everything
//! through the same paths live mutation uses, so a tampered or stale document
//! cannot smuggle in an invalid state.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::catalog::{FileTypeCatalog, KeyNames};
use crate::constants::groups::{DATASET_GROUP, TEMPLATES_GROUP};
use crate::constants::wildcard::MODEL_NAME_EXTRA_CHARS;
use crate::errors::ConfigError;
use crate::group::WildcardGroup;
use crate::template::{default_templates, fields_are_declared};
use crate::types::{GroupName, Label, ModelName};
use crate::value::Value;
use crate::wildcard::{Wildcard, WildcardPolicy};

/// A named collection of wildcard groups.
#[derive(Clone, Debug, Default)]
pub struct ConfigModel {
    name: Option<ModelName>,
    groups: indexmap::IndexMap<GroupName, WildcardGroup>,
    source: Option<PathBuf>,
}

impl ConfigModel {
    /// Create an empty, unnamed model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty model with a validated name.
    pub fn with_name(name: impl Into<ModelName>) -> Result<Self, ConfigError> {
        let mut model = Self::new();
        model.set_name(name)?;
        Ok(model)
    }

    /// The model name, if set.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the model name. Names allow alphanumerics plus `. _ - ` and
    /// spaces.
    pub fn set_name(&mut self, name: impl Into<ModelName>) -> Result<(), ConfigError> {
        let name = name.into();
        validate_model_name(&name)?;
        self.name = Some(name);
        Ok(())
    }

    /// The persistence path, if set.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Set the persistence path.
    ///
    /// Accepts an existing file, or a fresh filename whose parent directory
    /// exists (a bare filename counts as the current directory).
    pub fn set_source(&mut self, path: impl Into<PathBuf>) -> Result<(), ConfigError> {
        let path = path.into();
        if !path.is_file() {
            let parent = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent,
                _ => Path::new("."),
            };
            if !parent.is_dir() {
                return Err(ConfigError::PathNotExist { path });
            }
        }
        self.source = Some(path);
        Ok(())
    }

    /// Add a group; duplicate names are rejected.
    pub fn add_group(&mut self, group: WildcardGroup) -> Result<(), ConfigError> {
        if self.groups.contains_key(group.name()) {
            return Err(ConfigError::Value {
                label: group.name().to_string(),
                details: "a group with this name already exists".to_string(),
            });
        }
        self.groups.insert(group.name().to_string(), group);
        Ok(())
    }

    /// Borrow a group by name.
    pub fn group(&self, name: &str) -> Result<&WildcardGroup, ConfigError> {
        self.groups.get(name).ok_or_else(|| ConfigError::NotFound {
            name: name.to_string(),
        })
    }

    /// Mutably borrow a group by name.
    pub fn group_mut(&mut self, name: &str) -> Result<&mut WildcardGroup, ConfigError> {
        self.groups
            .get_mut(name)
            .ok_or_else(|| ConfigError::NotFound {
                name: name.to_string(),
            })
    }

    /// Remove a group by name. Required groups cannot be removed.
    pub fn remove_group(&mut self, name: &str) -> Result<WildcardGroup, ConfigError> {
        let required = self
            .groups
            .get(name)
            .ok_or_else(|| ConfigError::NotFound {
                name: name.to_string(),
            })?
            .policy()
            .required;
        if required {
            return Err(ConfigError::Required {
                label: name.to_string(),
            });
        }
        self.groups
            .shift_remove(name)
            .ok_or_else(|| ConfigError::NotFound {
                name: name.to_string(),
            })
    }

    /// Groups in insertion order.
    pub fn groups(&self) -> impl Iterator<Item = &WildcardGroup> {
        self.groups.values()
    }

    /// Serialize to a JSON document.
    ///
    /// `with_policy` keeps the `__metadata__` sidecars; `with_header` wraps
    /// the body in the model-name key and therefore requires a name.
    pub fn to_document(
        &self,
        with_policy: bool,
        with_header: bool,
    ) -> Result<serde_json::Value, ConfigError> {
        let mut body = serde_json::Map::new();
        for group in self.groups.values() {
            body.insert(group.name().to_string(), group.to_document(with_policy)?);
        }
        if !with_header {
            return Ok(serde_json::Value::Object(body));
        }
        let name = self.name.clone().ok_or_else(|| {
            ConfigError::Document("model has no name; set one before serializing".to_string())
        })?;
        let mut document = serde_json::Map::new();
        document.insert(name, serde_json::Value::Object(body));
        Ok(serde_json::Value::Object(document))
    }

    /// Rebuild a model from a document produced by [`Self::to_document`].
    pub fn load_document(document: &serde_json::Value) -> Result<Self, ConfigError> {
        let top = document.as_object().ok_or_else(|| {
            ConfigError::Document("expected a JSON object at the top level".to_string())
        })?;
        let (name, body) = match top.iter().next() {
            Some(entry) if top.len() == 1 => entry,
            _ => {
                return Err(ConfigError::Document(format!(
                    "expected exactly one top-level key (the model name), found {}",
                    top.len()
                )));
            }
        };
        let body = body.as_object().ok_or_else(|| {
            ConfigError::Document(format!("body of model '{name}' must be an object"))
        })?;
        let mut model = ConfigModel::new();
        model.set_name(name.clone())?;
        for (group_name, group_value) in body {
            let object = group_value.as_object().ok_or_else(|| {
                ConfigError::Document(format!("group '{group_name}' must be an object"))
            })?;
            model.add_group(WildcardGroup::from_document(group_name, object)?)?;
        }
        Ok(model)
    }

    /// Load a model from a JSON file and remember the path as its source.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = fs::read_to_string(&path)?;
        let document: serde_json::Value = serde_json::from_str(&text)?;
        let mut model = Self::load_document(&document)?;
        debug!(
            "[bidsvars:model] loaded {} group(s) from {}",
            model.groups.len(),
            path.display()
        );
        model.source = Some(path);
        Ok(model)
    }

    /// Write the full document (policies and header) to the source path.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = self.source.clone().ok_or_else(|| {
            ConfigError::Document("model has no source path; set one before saving".to_string())
        })?;
        self.save_to(&path)
    }

    /// Write the full document to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let document = self.to_document(true, true)?;
        let text = serde_json::to_string_pretty(&document)?;
        ensure_parent_dir(path)?;
        fs::write(path, text)?;
        debug!("[bidsvars:model] saved configuration to {}", path.display());
        Ok(())
    }

    /// Whether every field of `template` names a dataset-group wildcard.
    pub fn is_valid_template(&self, template: &str) -> Result<bool, ConfigError> {
        let dataset = self.group(DATASET_GROUP)?;
        fields_are_declared(template, &dataset.labels())
    }

    /// Derive default templates from the dataset group and install them as
    /// template wildcards, overwriting values of previously derived ones.
    ///
    /// Returns the labels installed, one `{type}Prefix` per active file type.
    pub fn make_default_templates(
        &mut self,
        keynames: &KeyNames,
        catalog: &FileTypeCatalog,
    ) -> Result<Vec<Label>, ConfigError> {
        let dataset = self.group(DATASET_GROUP)?;
        let derived = default_templates(
            &dataset.labels(),
            dataset.policy().valid_labels.as_deref(),
            keynames,
            catalog,
        )?;
        let templates = self.group_mut(TEMPLATES_GROUP)?;
        let mut installed = Vec::with_capacity(derived.len());
        for (label, text) in derived {
            if templates.contains(&label) {
                templates
                    .get_mut(&label)?
                    .set_value(Value::from(text.as_str()))?;
            } else {
                templates.add(Wildcard::template(
                    label.clone(),
                    Some(Value::from(text.as_str())),
                    WildcardPolicy::default(),
                )?)?;
            }
            installed.push(label);
        }
        Ok(installed)
    }
}

fn validate_model_name(name: &str) -> Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || MODEL_NAME_EXTRA_CHARS.contains(&ch));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::Value {
            label: name.to_string(),
            details: "model names allow alphanumerics, '.', '_', '-', and spaces".to_string(),
        })
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GroupPolicy;
    use crate::value::Scalar;

    fn model_with_bids() -> ConfigModel {
        let mut model = ConfigModel::with_name("study").unwrap();
        let mut bids = WildcardGroup::new(DATASET_GROUP, GroupPolicy::default()).unwrap();
        bids.add(
            Wildcard::new(
                "subject",
                Some(Value::Many(vec![Scalar::from("1")])),
                WildcardPolicy {
                    iterable: true,
                    required: true,
                    ..WildcardPolicy::default()
                },
            )
            .unwrap(),
        )
        .unwrap();
        bids.add(Wildcard::new("func_task", None, WildcardPolicy::default()).unwrap())
            .unwrap();
        bids.add(Wildcard::new("func_suffix", None, WildcardPolicy::default()).unwrap())
            .unwrap();
        model.add_group(bids).unwrap();
        model
            .add_group(
                WildcardGroup::new(
                    TEMPLATES_GROUP,
                    GroupPolicy {
                        accepts: crate::wildcard::WildcardVariant::Template,
                        ..GroupPolicy::default()
                    },
                )
                .unwrap(),
            )
            .unwrap();
        model
    }

    #[test]
    fn model_names_reject_exotic_characters() {
        assert!(ConfigModel::with_name("study v1.2_final-copy").is_ok());
        let err = ConfigModel::with_name("study/v1").unwrap_err();
        assert!(matches!(err, ConfigError::Value { .. }));
        let err = ConfigModel::with_name("").unwrap_err();
        assert!(matches!(err, ConfigError::Value { .. }));
    }

    #[test]
    fn source_accepts_fresh_names_in_existing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = ConfigModel::new();
        assert!(model.set_source(dir.path().join("config.json")).is_ok());
        assert!(model.set_source("bare_name.json").is_ok());
        let err = model
            .set_source(dir.path().join("missing").join("config.json"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::PathNotExist { .. }));
    }

    #[test]
    fn document_round_trip_is_lossless() {
        let model = model_with_bids();
        let document = model.to_document(true, true).unwrap();
        let rebuilt = ConfigModel::load_document(&document).unwrap();
        assert_eq!(rebuilt.name(), Some("study"));
        assert_eq!(rebuilt.to_document(true, true).unwrap(), document);
    }

    #[test]
    fn stripped_documents_drop_header_and_sidecars() {
        let model = model_with_bids();
        let document = model.to_document(false, false).unwrap();
        let object = document.as_object().unwrap();
        assert!(object.contains_key(DATASET_GROUP));
        assert!(object[DATASET_GROUP].get("__metadata__").is_none());
    }

    #[test]
    fn serializing_without_a_name_fails() {
        let model = ConfigModel::new();
        let err = model.to_document(true, true).unwrap_err();
        assert!(matches!(err, ConfigError::Document(_)));
    }

    #[test]
    fn documents_must_have_exactly_one_top_level_key() {
        let document = serde_json::json!({"a": {}, "b": {}});
        let err = ConfigModel::load_document(&document).unwrap_err();
        assert!(matches!(err, ConfigError::Document(_)));

        let document = serde_json::json!({});
        let err = ConfigModel::load_document(&document).unwrap_err();
        assert!(matches!(err, ConfigError::Document(_)));
    }

    #[test]
    fn save_and_load_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut model = model_with_bids();
        model.set_source(dir.path().join("config.json")).unwrap();
        model.save_to(&path).unwrap();

        let loaded = ConfigModel::load(&path).unwrap();
        assert_eq!(loaded.name(), Some("study"));
        assert_eq!(loaded.source(), Some(path.as_path()));
        assert_eq!(
            loaded.to_document(true, true).unwrap(),
            model.to_document(true, true).unwrap()
        );
    }

    #[test]
    fn default_templates_install_into_the_templates_group() {
        let mut model = model_with_bids();
        let installed = model
            .make_default_templates(KeyNames::builtin(), FileTypeCatalog::builtin())
            .unwrap();
        assert_eq!(installed, vec!["funcPrefix"]);
        let wildcard = model.group(TEMPLATES_GROUP).unwrap().get("funcPrefix").unwrap();
        assert_eq!(
            wildcard.value(),
            Some(&Value::One(Scalar::from(
                "sub-{subject}_task-{func_task}_{func_suffix}"
            )))
        );

        // Deriving again overwrites in place instead of duplicating.
        let installed = model
            .make_default_templates(KeyNames::builtin(), FileTypeCatalog::builtin())
            .unwrap();
        assert_eq!(installed, vec!["funcPrefix"]);
        assert_eq!(model.group(TEMPLATES_GROUP).unwrap().len(), 1);
    }

    #[test]
    fn template_validation_checks_dataset_labels() {
        let model = model_with_bids();
        assert!(model.is_valid_template("sub-{subject}_{func_suffix}").unwrap());
        assert!(!model.is_valid_template("sub-{subject}_{anat_suffix}").unwrap());
        assert!(!model.is_valid_template("no-fields").unwrap());
    }
}
