use std::path::PathBuf;
use thiserror::Error;

/// The main error type for fieldbox operations.
///
/// Recoverable per-field and per-line conditions (unknown labels, malformed
/// label lines, out-of-range class indices) are not errors; they are reported
/// as [`UnitIssue`](crate::report::UnitIssue)s alongside the result.
#[derive(Debug, Error)]
pub enum FieldboxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid geometry: {message}")]
    InvalidGeometry { message: String },

    #[error("Invalid label registry: {message}")]
    InvalidLabelRegistry { message: String },

    #[error("Label registry mismatch: expected fingerprint {expected}, found {found}")]
    LabelRegistryMismatch { expected: String, found: String },

    #[error("Failed to parse class file {path}: {source}")]
    ClassYamlParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid class file {path}: {message}")]
    ClassYamlInvalid { path: PathBuf, message: String },

    #[error("Invalid classes.txt at {path}: {message}")]
    ClassesTxtInvalid { path: PathBuf, message: String },

    #[error("Failed to parse analysis JSON from {path}: {source}")]
    AnalysisJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid analysis result in {path}: {message}")]
    AnalysisJsonInvalid { path: PathBuf, message: String },

    #[error("Failed to parse LabelMe JSON from {path}: {source}")]
    LabelmeJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write LabelMe JSON to {path}: {source}")]
    LabelmeJsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read image dimensions from {path}: {source}")]
    ImageDimensionRead {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Invalid split parameters: {message}")]
    InvalidSplitParams { message: String },

    #[error("Invalid directory layout at {path}: {message}")]
    LayoutInvalid { path: PathBuf, message: String },

    #[error("Failed to serialize report: {0}")]
    ReportSerialize(#[source] serde_json::Error),

    #[error("Batch '{operation}' finished with {failed} failed unit(s)")]
    BatchFailed { operation: String, failed: usize },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

impl FieldboxError {
    pub(crate) fn invalid_geometry(message: impl Into<String>) -> Self {
        FieldboxError::InvalidGeometry {
            message: message.into(),
        }
    }
}
