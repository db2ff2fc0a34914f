//! Error types for the segmented imputation pipeline.
//!
//! Only configuration and input-shape problems surface as errors. Failures of
//! the tree inducer, discretizer or EM routine are absorbed by the pipeline and
//! reported as summary warnings instead.
//!
//! Errors serialize as `{ code, message }` so a host application can forward
//! them to a UI unchanged.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

use crate::config::ConfigValidationError;

/// The main error type for the imputation pipeline.
#[derive(Error, Debug)]
pub enum ImputationError {
    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Column type the dataset model cannot represent.
    #[error("Column '{column}' has unsupported type {dtype}")]
    UnsupportedColumn { column: String, dtype: String },

    /// Column was not found in the dataset.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Dataset has no rows or no columns.
    #[error("Dataset is empty")]
    EmptyDataset,

    /// Records or frames disagree with the schema.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Internal invariant broken.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ImputationError>,
    },
}

impl ImputationError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ImputationError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for host applications.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::UnsupportedColumn { .. } => "UNSUPPORTED_COLUMN",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::EmptyDataset => "EMPTY_DATASET",
            Self::SchemaMismatch(_) => "SCHEMA_MISMATCH",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// True when the caller can fix the input and retry.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::InvalidConfig(_)
            | Self::UnsupportedColumn { .. }
            | Self::ColumnNotFound(_)
            | Self::EmptyDataset => true,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

impl From<ConfigValidationError> for ImputationError {
    fn from(err: ConfigValidationError) -> Self {
        ImputationError::InvalidConfig(err.to_string())
    }
}

impl Serialize for ImputationError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ImputationError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for imputation operations.
pub type Result<T> = std::result::Result<T, ImputationError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ImputationError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(ImputationError::EmptyDataset.error_code(), "EMPTY_DATASET");
        assert_eq!(
            ImputationError::UnsupportedColumn {
                column: "when".to_string(),
                dtype: "date".to_string(),
            }
            .error_code(),
            "UNSUPPORTED_COLUMN"
        );
    }

    #[test]
    fn test_is_recoverable() {
        assert!(ImputationError::InvalidConfig("x".to_string()).is_recoverable());
        assert!(ImputationError::EmptyDataset.is_recoverable());
        assert!(!ImputationError::Internal("boom".to_string()).is_recoverable());
        assert!(
            ImputationError::EmptyDataset
                .with_context("loading")
                .is_recoverable()
        );
    }

    #[test]
    fn test_config_error_conversion() {
        let err: ImputationError = ConfigValidationError::TooFewCategories(1).into();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert!(err.to_string().contains("1"));
    }

    #[test]
    fn test_error_serialization() {
        let error = ImputationError::ColumnNotFound("income".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("income"));
    }

    #[test]
    fn test_with_context() {
        let error = ImputationError::SchemaMismatch("3 values, 4 attributes".to_string())
            .with_context("Reading frame");
        assert!(error.to_string().contains("Reading frame"));
        assert_eq!(error.error_code(), "SCHEMA_MISMATCH");
    }
}
