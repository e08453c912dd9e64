//! Error types for the composable-decontam library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum DecontamError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid count value '{value}' at row {row}, column {col}")]
    InvalidCount {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Duplicate {kind} identifier '{id}'")]
    DuplicateId { kind: &'static str, id: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Two tables that must describe the same samples do not.
    #[error("Sample schema mismatch ({context}): {detail}")]
    SchemaMismatch { context: String, detail: String },

    /// A kept/removed split does not add back up to the original table.
    #[error(
        "Reconstruction violated for variant '{variant}' in sample '{sample}': \
         original {expected}, kept + removed {actual}"
    )]
    ReconstructionViolation {
        variant: String,
        sample: String,
        expected: f64,
        actual: f64,
    },

    #[error("Sample '{0}' has zero total abundance")]
    DegenerateSample(String),

    #[error("Unknown method type '{0}'")]
    UnknownMethodType(String),

    #[error("Missing column '{0}' in metadata")]
    MissingColumn(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Method '{label}' failed: {reason}")]
    Method { label: String, reason: String },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, DecontamError>;
