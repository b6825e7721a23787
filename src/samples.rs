//! Stock groups and the standard model shape.
//!
//! These factories build the four groups a typical pipeline configuration
//! starts from: dataset entity wildcards, pipeline paths, filename
//! templates, and free parameters. Everything here is plain construction
//! over the file-type catalog; callers customize the result through the
//! normal group and wildcard operations.

use crate::catalog::FileTypeCatalog;
use crate::constants::catalog::BASE_TYPE;
use crate::constants::filename::FIELD_SEP;
use crate::constants::groups::{DATASET_GROUP, PARAMS_GROUP, PATHS_GROUP, TEMPLATES_GROUP};
use crate::errors::ConfigError;
use crate::group::{GroupPolicy, WildcardGroup};
use crate::model::ConfigModel;
use crate::types::Label;
use crate::value::ValueKind;
use crate::wildcard::{Wildcard, WildcardPolicy, WildcardVariant};

const DATASET_GROUP_HELP: &str = "Dataset entity wildcards. Their values drive index queries and \
     filename templates. A label shared by several file types carries the \
     type as a prefix to keep the wildcards distinct.";

const PATHS_GROUP_HELP: &str = "Filesystem paths the pipeline reads from and writes to. Further \
     paths (containers, license files, external tools) can be added as \
     needed.";

const TEMPLATES_GROUP_HELP: &str = "Filename-construction templates, one per file type. Template \
     fields must reference declared dataset wildcards.";

const PARAMS_GROUP_HELP: &str =
    "Free parameters for pipeline steps. No restrictions on labels or kinds.";

const OUTPUT_HELP: &str = "Base path for final pipeline outputs, typically a derivatives folder.";

const WORKING_HELP: &str = "Base path for intermediate working files.";

const BIDS_ROOT_HELP: &str = "Root of the dataset tree the index serves files from.";

/// Which slice of a file type's labels the dataset group starts with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LabelLevel {
    /// Only the labels a well-formed file of the type must carry.
    #[default]
    Minimal,
    /// Every label the type knows.
    All,
}

/// Build the dataset entity group for the requested file types.
///
/// The shared `base` entry is prepended unless the caller lists it
/// explicitly. Each label becomes a required-iff-minimal, iterable `str`
/// wildcard named `{type}_{label}` (bare for `base`). The group accepts
/// further Generic wildcards for any label the catalog knows.
pub fn dataset_group(
    file_types: &[&str],
    level: LabelLevel,
    catalog: &FileTypeCatalog,
) -> Result<WildcardGroup, ConfigError> {
    let mut requested: Vec<&str> = Vec::new();
    if !file_types.contains(&BASE_TYPE) {
        requested.push(BASE_TYPE);
    }
    requested.extend_from_slice(file_types);

    let policy = GroupPolicy {
        help: Some(DATASET_GROUP_HELP.to_string()),
        required: true,
        valid_labels: Some(catalog_labels(catalog)),
        accepts: WildcardVariant::Generic,
    };
    let mut group = WildcardGroup::new(DATASET_GROUP, policy)?;

    for file_type in requested {
        let spec = catalog.get(file_type).ok_or_else(|| {
            let known: Vec<&str> = catalog.iter().map(|(name, _)| name.as_str()).collect();
            ConfigError::Value {
                label: file_type.to_string(),
                details: format!("not a recognized file type; must be one of {known:?}"),
            }
        })?;
        let labels = match level {
            LabelLevel::Minimal => &spec.labels.minimal,
            LabelLevel::All => &spec.labels.all,
        };
        for label in labels {
            let required = spec.labels.minimal.contains(label);
            group.add(Wildcard::new(
                prefixed(file_type, label),
                None,
                WildcardPolicy {
                    kind: Some(ValueKind::Str),
                    iterable: true,
                    required,
                    ..WildcardPolicy::default()
                },
            )?)?;
        }
    }
    Ok(group)
}

/// Build the pipeline path group: `output`, `working`, and `bids` Path
/// wildcards, none individually required, with the group itself required.
pub fn paths_group() -> Result<WildcardGroup, ConfigError> {
    let policy = GroupPolicy {
        help: Some(PATHS_GROUP_HELP.to_string()),
        required: true,
        valid_labels: None,
        accepts: WildcardVariant::Path,
    };
    let mut group = WildcardGroup::new(PATHS_GROUP, policy)?;
    for (label, help) in [
        ("output", OUTPUT_HELP),
        ("working", WORKING_HELP),
        ("bids", BIDS_ROOT_HELP),
    ] {
        group.add(Wildcard::path(
            label,
            None,
            WildcardPolicy {
                help: Some(help.to_string()),
                ..WildcardPolicy::default()
            },
        )?)?;
    }
    Ok(group)
}

/// Build the empty template group; members must be Template wildcards.
pub fn templates_group() -> Result<WildcardGroup, ConfigError> {
    WildcardGroup::new(
        TEMPLATES_GROUP,
        GroupPolicy {
            help: Some(TEMPLATES_GROUP_HELP.to_string()),
            required: true,
            valid_labels: None,
            accepts: WildcardVariant::Template,
        },
    )
}

/// Build the empty free-parameter group; optional and unrestricted.
pub fn params_group() -> Result<WildcardGroup, ConfigError> {
    WildcardGroup::new(
        PARAMS_GROUP,
        GroupPolicy {
            help: Some(PARAMS_GROUP_HELP.to_string()),
            required: false,
            valid_labels: None,
            accepts: WildcardVariant::Generic,
        },
    )
}

/// Build a named model carrying the four stock groups.
pub fn standard_model(
    name: &str,
    file_types: &[&str],
    level: LabelLevel,
    catalog: &FileTypeCatalog,
) -> Result<ConfigModel, ConfigError> {
    let mut model = ConfigModel::with_name(name)?;
    model.add_group(dataset_group(file_types, level, catalog)?)?;
    model.add_group(paths_group()?)?;
    model.add_group(templates_group()?)?;
    model.add_group(params_group()?)?;
    Ok(model)
}

fn prefixed(file_type: &str, label: &str) -> Label {
    if file_type == BASE_TYPE {
        label.to_string()
    } else {
        format!("{file_type}{FIELD_SEP}{label}")
    }
}

fn catalog_labels(catalog: &FileTypeCatalog) -> Vec<Label> {
    let mut labels = Vec::new();
    for (name, spec) in catalog.iter() {
        for label in &spec.labels.all {
            labels.push(prefixed(name, label));
        }
    }
    labels
}
