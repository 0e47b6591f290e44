//! Error types for the tabload ingestion pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`SchemaError`] - Schema declaration loading errors
//! - [`CsvError`] - CSV reading and decoding errors
//! - [`CoercionError`] - Cell coercion errors
//! - [`SinkError`] - Table creation and insertion errors
//! - [`ProcessError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Schema Errors
// =============================================================================

/// Errors while loading a schema declaration.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The declaration failed meta-schema validation.
    #[error("Invalid schema declaration: {}", errors.join("; "))]
    InvalidDeclaration { errors: Vec<String> },

    /// The declaration is not a JSON object with `properties`.
    #[error("Schema declaration must be an object with a 'properties' map")]
    NotAnObject,

    /// A required name does not refer to any declared field.
    #[error("Required field '{0}' is not declared in properties")]
    UnknownRequired(String),

    /// A field declares a type with no coercion rule.
    #[error("Field '{field}' declares unsupported type '{declared}'")]
    UnsupportedType { field: String, declared: String },

    /// A field declares an empty enum.
    #[error("Field '{0}' declares an empty enum")]
    EmptyEnum(String),

    /// Failed to read the declaration file.
    #[error("Failed to read schema file: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed JSON.
    #[error("Schema JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// CSV Reading Errors
// =============================================================================

/// Errors during CSV reading and decoding.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to decode bytes with the detected encoding.
    #[error("Failed to decode content: {0}")]
    EncodingError(String),

    /// A record could not be read.
    #[error("Cannot read record at line {line}: {message}")]
    ReadError { line: usize, message: String },

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// No CSV file found during directory discovery.
    #[error("No CSV files found in the current directory")]
    NoCsvFound,
}

// =============================================================================
// Coercion Errors
// =============================================================================

/// Errors while coercing a raw cell to a typed value.
///
/// In strict mode every variant aborts the run. In lenient mode all
/// variants except [`CoercionError::NumericFormat`] are substituted with a
/// default and logged instead of raised.
#[derive(Debug, Error)]
pub enum CoercionError {
    /// Empty cell in a string field (strict mode only).
    #[error("Empty cell in field '{field}'")]
    EmptyCell { field: String },

    /// Null sentinel in a numeric field (strict mode only).
    #[error("Field '{field}' requires a numeric value, got a null sentinel")]
    RequiredNumeric { field: String },

    /// Unparseable numeric cell. Fatal in both modes.
    #[error("Field '{field}' cannot parse '{value}' as a number")]
    NumericFormat { field: String, value: String },

    /// Cell is neither a true nor a false literal (strict mode only).
    #[error("Field '{field}' cannot interpret '{value}' as a boolean")]
    InvalidBoolean { field: String, value: String },

    /// Cell is outside the declared enum (strict mode only).
    #[error("Unexpected enum value '{value}' for field '{field}'. Allowed values: {allowed:?}")]
    InvalidEnum {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    /// Cell could not be parsed as a calendar timestamp (strict mode only).
    #[error("Field '{field}' cannot parse '{value}' as a date-time")]
    DatetimeParse { field: String, value: String },
}

// =============================================================================
// Sink Errors
// =============================================================================

/// Errors from the storage sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Could not connect to the database.
    #[error("Could not connect to the database: {0}")]
    ConnectionError(String),

    /// A cell could not be bound to its column type.
    #[error("Cannot bind value '{value}' for column '{column}': {message}")]
    BadCell {
        column: String,
        value: String,
        message: String,
    },

    /// Query execution failed.
    #[error("Database error: {0}")]
    SqlError(#[from] sqlx::Error),
}

// =============================================================================
// Process Errors (top-level)
// =============================================================================

/// Top-level orchestration errors.
///
/// This is the main error type returned by [`crate::process::process_file`].
/// It wraps all lower-level errors and adds row-context variants.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Schema loading error.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// CSV reading error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Coercion failed at a specific row.
    #[error("Row {row}: {source}")]
    Coercion {
        row: usize,
        #[source]
        source: CoercionError,
    },

    /// Validation failed at a specific row (strict mode abort).
    #[error("Row {row} failed validation: {reason}")]
    RowInvalid { row: usize, reason: String },

    /// Sink error.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// No data rows to process.
    #[error("No rows to process")]
    EmptyInput,
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for schema loading.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Result type for CSV reading.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for cell coercion.
pub type CoerceResult<T> = Result<T, CoercionError>;

/// Result type for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type for pipeline operations.
pub type ProcessResult<T> = Result<T, ProcessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // CsvError -> ProcessError
        let csv_err = CsvError::EmptyFile;
        let process_err: ProcessError = csv_err.into();
        assert!(process_err.to_string().contains("empty"));

        // SchemaError -> ProcessError
        let schema_err = SchemaError::UnknownRequired("email".into());
        let process_err: ProcessError = schema_err.into();
        assert!(process_err.to_string().contains("email"));
    }

    #[test]
    fn test_coercion_error_carries_row_context() {
        let err = ProcessError::Coercion {
            row: 7,
            source: CoercionError::NumericFormat {
                field: "id".into(),
                value: "abc".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("Row 7"));
        assert!(msg.contains("abc"));
    }

    #[test]
    fn test_enum_error_names_allowed_set() {
        let err = CoercionError::InvalidEnum {
            field: "user_role".into(),
            value: "root".into(),
            allowed: vec!["admin".into(), "user".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("root"));
        assert!(msg.contains("admin"));
        assert!(msg.contains("user_role"));
    }
}
