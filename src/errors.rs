use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::Label;

/// Error type for wildcard validation, document handling, and index failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("wrong kind for '{label}': {details}")]
    Kind { label: Label, details: String },
    #[error("invalid value for '{label}': {details}")]
    Value { label: Label, details: String },
    #[error("'{name}' not found")]
    NotFound { name: String },
    #[error("'{label}' is required and cannot be removed")]
    Required { label: Label },
    #[error("'{label}' is not iterable")]
    NotIterable { label: Label },
    #[error("path does not exist: {}", path.display())]
    PathNotExist { path: PathBuf },
    #[error("malformed configuration document: {0}")]
    Document(String),
    #[error("dataset index failure: {reason}")]
    Index { reason: String },
    #[error(transparent)]
    Pattern(#[from] regex::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
