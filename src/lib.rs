//! # Tabload - schema-driven CSV ingestion into PostgreSQL
//!
//! Tabload reads a CSV file, coerces each cell to a typed value according
//! to a declarative schema, validates the resulting records, and persists
//! the valid ones into a PostgreSQL table, creating the table on demand.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Coerce +   │────▶│    Sink     │
//! │  (ISO/UTF8) │     │  (auto-enc) │     │  Validate   │     │ (Postgres)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! Two operating modes govern everything: **strict** aborts the run on the
//! first cell that cannot be coerced faithfully or row that fails
//! validation; **lenient** substitutes type-appropriate defaults, skips
//! rows that still do not validate, and delivers as much as it can.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabload::{process_file, MemorySink, ProcessingConfig, Schema};
//!
//! #[tokio::main]
//! async fn main() {
//!     let schema = Schema::example();
//!     let sink = MemorySink::new();
//!     let summary = process_file(
//!         "users.csv".as_ref(),
//!         None,
//!         &schema,
//!         &ProcessingConfig::default(),
//!         &sink,
//!         "users",
//!     )
//!     .await
//!     .unwrap();
//!     println!("Inserted {} rows", summary.inserted);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Typed cells, rows, and run configuration
//! - [`schema`] - Declarative schema loading
//! - [`parser`] - CSV reading with auto-detection
//! - [`coerce`] - Cell coercion
//! - [`validate`] - Row validation
//! - [`process`] - The ingestion loop
//! - [`sink`] - Postgres and in-memory sinks
//! - [`logs`] - Pipeline log stream

// Core modules
pub mod error;
pub mod models;
pub mod schema;

// Parsing
pub mod parser;

// Coercion and validation
pub mod coerce;
pub mod validate;

// Orchestration
pub mod process;

// Storage
pub mod sink;

// Logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CoercionError,
    CsvError,
    ProcessError,
    SchemaError,
    SinkError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, ProcessingConfig, TypedRow};

// =============================================================================
// Re-exports - Schema
// =============================================================================

pub use schema::{FieldFormat, FieldSpec, FieldType, Schema, EXAMPLE_DECLARATION};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    detect_delimiter,
    detect_encoding,
    decode_content,
    discover_csv,
    parse_bytes_auto,
    parse_file_auto,
    parse_file_with,
    ParseResult,
};

// =============================================================================
// Re-exports - Coercion
// =============================================================================

pub use coerce::{coerce, parse_timestamp, FALSE_LITERALS, NULL_SENTINELS, TRUE_LITERALS};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validate::{check_row, is_valid_datetime, is_valid_email, validate, RowViolation};

// =============================================================================
// Re-exports - Processing
// =============================================================================

pub use process::{
    coerce_row,
    process_bytes,
    process_file,
    process_rows,
    seems_to_be_header,
    CsvInfo,
    ProcessSummary,
};

// =============================================================================
// Re-exports - Sink
// =============================================================================

pub use sink::{
    column_sql_type,
    create_table_sql,
    sanitize_table_name,
    MemorySink,
    PostgresSink,
    Sink,
};
