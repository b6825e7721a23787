//! Static filename resources: the key-name dictionary and file-type catalog.
//!
//! Both are embedded JSON parsed once per process. Components take them by
//! reference so alternate resources can be injected; `builtin()` returns the
//! shared process-wide copies.

use std::sync::OnceLock;

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;

use crate::constants::catalog::{
    ALNUM_CLASS, DIGIT_CLASS, INDEX_TOKEN, LABEL_TOKEN, MATCHES_TOKEN, SPAN_CLASS, SUFFIX_TOKEN,
};
use crate::errors::ConfigError;
use crate::types::{FieldName, FileTypeName, Label};
use crate::utils::rename_keys;

const KEYNAMES_JSON: &str = include_str!("../resources/keynames.json");
const FILETYPES_JSON: &str = include_str!("../resources/filetypes.json");

/// Ordered dictionary between canonical field names and on-disk abbreviations.
#[derive(Clone, Debug)]
pub struct KeyNames {
    to_abbreviation: IndexMap<String, String>,
    to_canonical: IndexMap<String, String>,
}

impl KeyNames {
    /// Build from a canonical-name-to-abbreviation mapping.
    pub fn new(to_abbreviation: IndexMap<String, String>) -> Self {
        let to_canonical = to_abbreviation
            .iter()
            .map(|(canonical, abbreviation)| (abbreviation.clone(), canonical.clone()))
            .collect();
        Self {
            to_abbreviation,
            to_canonical,
        }
    }

    /// Parse a JSON object of canonical-name-to-abbreviation entries.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let to_abbreviation: IndexMap<String, String> = serde_json::from_str(text)?;
        Ok(Self::new(to_abbreviation))
    }

    /// Shared dictionary parsed from the embedded resource.
    pub fn builtin() -> &'static KeyNames {
        static BUILTIN: OnceLock<KeyNames> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            KeyNames::from_json(KEYNAMES_JSON).expect("embedded key-name dictionary is valid")
        })
    }

    /// On-disk abbreviation for a canonical field name.
    pub fn abbreviation(&self, canonical: &str) -> Option<&str> {
        self.to_abbreviation.get(canonical).map(String::as_str)
    }

    /// Canonical field name for an on-disk abbreviation.
    pub fn canonical(&self, abbreviation: &str) -> Option<&str> {
        self.to_canonical.get(abbreviation).map(String::as_str)
    }

    /// Full canonical-to-abbreviation mapping, in dictionary order.
    pub fn abbreviation_map(&self) -> &IndexMap<String, String> {
        &self.to_abbreviation
    }

    /// Rename a decoded field map from abbreviations to canonical names.
    ///
    /// Uses match-at-end substitution so abbreviations that are substrings of
    /// other field names (`rec` inside `recording`) cannot corrupt them.
    pub fn expand_keys<V: Clone>(
        &self,
        fields: &IndexMap<FieldName, V>,
    ) -> Result<IndexMap<FieldName, V>, ConfigError> {
        rename_keys(fields, &self.to_canonical, true)
    }
}

/// Labels a file type declares, split into the required core and the full set.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct LabelSet {
    /// Labels every file of this type must carry.
    pub minimal: Vec<Label>,
    /// Every label files of this type may carry.
    pub all: Vec<Label>,
}

/// One catalog entry: declared labels plus filename templates for detection.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FileTypeSpec {
    /// Declared label sets.
    pub labels: LabelSet,
    /// Detection templates in placeholder syntax (see [`compile_template`]).
    #[serde(default)]
    pub templates: Vec<String>,
}

/// Result of matching a filename against every catalog entry's templates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileTypeMatch {
    /// No catalog entry matched.
    None,
    /// Exactly one entry matched.
    Unique(FileTypeName),
    /// Two or more entries matched; all candidates are surfaced.
    Ambiguous(Vec<FileTypeName>),
}

impl FileTypeMatch {
    /// The matched name when detection was unambiguous.
    pub fn unique(&self) -> Option<&FileTypeName> {
        match self {
            FileTypeMatch::Unique(name) => Some(name),
            _ => None,
        }
    }
}

/// Catalog of file types with precompiled detection patterns.
#[derive(Clone, Debug)]
pub struct FileTypeCatalog {
    types: IndexMap<FileTypeName, FileTypeSpec>,
    patterns: IndexMap<FileTypeName, Vec<Regex>>,
}

impl FileTypeCatalog {
    /// Build a catalog, compiling every entry's templates.
    pub fn new(types: IndexMap<FileTypeName, FileTypeSpec>) -> Result<Self, ConfigError> {
        let mut patterns = IndexMap::with_capacity(types.len());
        for (name, spec) in &types {
            let compiled = spec
                .templates
                .iter()
                .map(|template| compile_template(template))
                .collect::<Result<Vec<_>, _>>()?;
            patterns.insert(name.clone(), compiled);
        }
        Ok(Self { types, patterns })
    }

    /// Parse a JSON object of file-type entries.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let types: IndexMap<FileTypeName, FileTypeSpec> = serde_json::from_str(text)?;
        Self::new(types)
    }

    /// Shared catalog parsed from the embedded resource.
    pub fn builtin() -> &'static FileTypeCatalog {
        static BUILTIN: OnceLock<FileTypeCatalog> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            FileTypeCatalog::from_json(FILETYPES_JSON).expect("embedded file-type catalog is valid")
        })
    }

    /// Look up one file type.
    pub fn get(&self, name: &str) -> Option<&FileTypeSpec> {
        self.types.get(name)
    }

    /// Whether the catalog declares `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Iterate entries in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (&FileTypeName, &FileTypeSpec)> {
        self.types.iter()
    }

    /// Match `filename` against every entry's templates.
    ///
    /// Entries without templates (the shared `base` entry) never match.
    pub fn detect(&self, filename: &str) -> FileTypeMatch {
        let mut matched: Vec<FileTypeName> = Vec::new();
        for (name, patterns) in &self.patterns {
            if patterns.iter().any(|pattern| pattern.is_match(filename)) {
                matched.push(name.clone());
            }
        }
        match matched.len() {
            0 => FileTypeMatch::None,
            1 => FileTypeMatch::Unique(matched.swap_remove(0)),
            _ => FileTypeMatch::Ambiguous(matched),
        }
    }
}

/// Compile a detection template into a start-anchored pattern.
///
/// Placeholders: `<label>` and `<suffix>` become an alphanumeric run,
/// `<index>` a digit run, `<matches>` a run of filename-safe characters;
/// `[...]` becomes an optional non-capturing group. Everything else matches
/// literally. Patterns are not end-anchored, so a trailing extension never
/// blocks a match.
pub fn compile_template(template: &str) -> Result<Regex, ConfigError> {
    let mut pattern = String::with_capacity(template.len() + 8);
    pattern.push('^');
    let mut literal = String::new();
    let mut rest = template;
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix(LABEL_TOKEN) {
            flush_literal(&mut pattern, &mut literal);
            pattern.push_str(ALNUM_CLASS);
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix(SUFFIX_TOKEN) {
            flush_literal(&mut pattern, &mut literal);
            pattern.push_str(ALNUM_CLASS);
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix(INDEX_TOKEN) {
            flush_literal(&mut pattern, &mut literal);
            pattern.push_str(DIGIT_CLASS);
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix(MATCHES_TOKEN) {
            flush_literal(&mut pattern, &mut literal);
            pattern.push_str(SPAN_CLASS);
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix('[') {
            flush_literal(&mut pattern, &mut literal);
            pattern.push_str("(?:");
            rest = tail;
        } else if let Some(tail) = rest.strip_prefix(']') {
            flush_literal(&mut pattern, &mut literal);
            pattern.push_str(")?");
            rest = tail;
        } else if let Some(ch) = rest.chars().next() {
            literal.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }
    flush_literal(&mut pattern, &mut literal);
    Regex::new(&pattern).map_err(ConfigError::from)
}

fn flush_literal(pattern: &mut String, literal: &mut String) {
    if !literal.is_empty() {
        pattern.push_str(&regex::escape(literal));
        literal.clear();
    }
}
