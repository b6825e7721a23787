use indexmap::IndexMap;

/// Wildcard label (bare identifier).
/// Examples: `subject`, `func_task`, `funcPrefix`
pub type Label = String;
/// Group name (alphanumeric).
/// Examples: `bids`, `paths`, `templates`
pub type GroupName = String;
/// Model name (alphanumeric plus `._- `).
/// Example: `fmri-preproc config`
pub type ModelName = String;
/// Canonical or abbreviated filename field name.
/// Examples: `subject`, `sub`, `acquisition`, `acq`
pub type FieldName = String;
/// File-type name from the catalog.
/// Examples: `anat`, `func`, `fmap`, `physio`
pub type FileTypeName = String;
/// Subject identifier as it appears in filenames.
/// Examples: `1`, `04`, `control12`
pub type SubjectId = String;
/// Filename-construction template text.
/// Example: `sub-{subject}_task-{func_task}_{func_suffix}`
pub type TemplateText = String;
/// Resolution log line.
/// Example: `subject 3 not included. Has 4 of 6 required files.`
pub type LogLine = String;
/// Query constraints handed to a dataset index: field name to accepted values.
/// A file matches when every constrained field decodes to one of the values.
pub type Constraints = IndexMap<FieldName, Vec<String>>;

/// Sidecar metadata for one dataset file, as parsed JSON.
pub type MetadataMap = serde_json::Map<String, serde_json::Value>;
