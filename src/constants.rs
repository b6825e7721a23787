/// Constants used by the persisted configuration document layout.
pub mod document {
    /// Sidecar key carrying group and wildcard policies inside a group object.
    pub const METADATA_KEY: &str = "__metadata__";
    /// Sidecar field naming the wildcard variant (`Generic`, `Path`, `Template`).
    pub const VARIANT_KEY: &str = "variant";
}

/// Constants used by filename decoding and field naming.
pub mod filename {
    /// Separator between a field abbreviation and its value (`sub-01`).
    pub const KEY_VALUE_SEP: char = '-';
    /// Separator between fields in a filename (`sub-01_ses-1`).
    pub const FIELD_SEP: char = '_';
    /// Implicit field holding the final filename token before the extension.
    pub const SUFFIX_KEY: &str = "suffix";
    /// Implicit field holding everything after the first `.` of the last token.
    pub const EXTENSION_KEY: &str = "extension";
    /// Canonical subject field name; never namespaced by a file type.
    pub const SUBJECT_KEY: &str = "subject";
    /// Canonical session field name; never namespaced by a file type.
    pub const SESSION_KEY: &str = "session";
}

/// Constants used by template-placeholder compilation.
pub mod catalog {
    /// Placeholder for an alphanumeric entity value.
    pub const LABEL_TOKEN: &str = "<label>";
    /// Placeholder for a numeric entity value.
    pub const INDEX_TOKEN: &str = "<index>";
    /// Placeholder for a filename suffix token.
    pub const SUFFIX_TOKEN: &str = "<suffix>";
    /// Placeholder matching any run of filename-safe characters.
    pub const MATCHES_TOKEN: &str = "<matches>";
    /// Character class compiled for `<label>` and `<suffix>`.
    pub const ALNUM_CLASS: &str = "[0-9A-Za-z]+";
    /// Character class compiled for `<index>`.
    pub const DIGIT_CLASS: &str = "[0-9]+";
    /// Character class compiled for `<matches>`.
    pub const SPAN_CLASS: &str = "[0-9A-Za-z_-]+";
    /// File type holding the fields shared by every file (subject, session).
    pub const BASE_TYPE: &str = "base";
}

/// Constants used by wildcard validation.
pub mod wildcard {
    /// Characters rejected inside template wildcard values.
    pub const ILLEGAL_TEMPLATE_CHARS: [char; 8] =
        ['\\', ':', '*', '?', '<', '>', '|', ' '];
    /// Characters accepted in a model name beyond alphanumerics.
    pub const MODEL_NAME_EXTRA_CHARS: [char; 4] = ['.', '_', '-', ' '];
}

/// Names of the stock groups a standard model carries.
pub mod groups {
    /// Group of dataset-entity wildcards driving queries and templates.
    pub const DATASET_GROUP: &str = "bids";
    /// Group of pipeline filesystem paths.
    pub const PATHS_GROUP: &str = "paths";
    /// Group of filename-construction templates.
    pub const TEMPLATES_GROUP: &str = "templates";
    /// Group of free pipeline parameters.
    pub const PARAMS_GROUP: &str = "params";
}

/// Constants used by subject resolution.
pub mod resolver {
    /// File types queried with the imaging extension.
    pub const IMAGING_TYPES: [&str; 4] = ["anat", "func", "dwi", "fmap"];
    /// Extension queried for imaging file types.
    pub const IMAGING_EXTENSION: &str = "nii.gz";
    /// Extension queried for physiological recordings.
    pub const PHYSIO_EXTENSION: &str = "tsv.gz";
    /// File type whose files are cross-checked against imaging metadata.
    pub const FIELDMAP_TYPE: &str = "fmap";
    /// File type whose files are cross-checked against imaging filenames.
    pub const PHYSIO_TYPE: &str = "physio";
    /// Metadata key listing the imaging files a fieldmap applies to.
    pub const INTENDED_FOR_KEY: &str = "IntendedFor";
    /// Timestamp format used on resolution log lines.
    pub const LOG_TIME_FORMAT: &str = "%H:%M:%S";
}
