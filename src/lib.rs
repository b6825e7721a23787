#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// File-type catalog and the filename key dictionary.
pub mod catalog;
/// Centralized constants used across documents, filenames, and resolution.
pub mod constants;
/// Filename decoding and expected-combination counting.
pub mod filename;
/// Wildcard groups and group policies.
pub mod group;
/// Dataset index traits and built-in backends.
pub mod index;
/// Top-level configuration model and JSON persistence.
pub mod model;
/// Subject resolution over a dataset index.
pub mod resolver;
/// Stock groups and the standard model shape.
pub mod samples;
/// Template field extraction, validation, and default-template derivation.
pub mod template;
/// Shared type aliases.
pub mod types;
/// Simultaneous multi-pattern replacement helpers.
pub mod utils;
/// Scalar values and the scalar-or-list wrapper stored by wildcards.
pub mod value;
/// Typed wildcards: variants, policies, validated mutation.
pub mod wildcard;

mod errors;

pub use catalog::{FileTypeCatalog, FileTypeMatch, FileTypeSpec, KeyNames, LabelSet};
pub use errors::ConfigError;
pub use filename::{DecodedName, active_file_types, decode_filename, expected_combinations};
pub use group::{GroupPolicy, WildcardGroup};
pub use index::{
    DatasetFile, DatasetIndex, DirectoryFile, DirectoryIndex, InMemoryFile, InMemoryIndex,
    matches_constraints,
};
pub use model::ConfigModel;
pub use resolver::{ExcludedSubject, ResolutionReport, SubjectResolver};
pub use samples::{
    LabelLevel, dataset_group, params_group, paths_group, standard_model, templates_group,
};
pub use template::{default_templates, fields_are_declared, template_fields};
pub use types::{
    Constraints, FieldName, FileTypeName, GroupName, Label, LogLine, MetadataMap, ModelName,
    SubjectId, TemplateText,
};
pub use value::{Scalar, Value, ValueKind};
pub use wildcard::{Wildcard, WildcardPolicy, WildcardVariant};
