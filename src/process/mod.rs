//! The ingestion loop: raw rows in, one validated batch out.
//!
//! Drives coercion and validation per row, then hands the accumulated
//! batch to the sink in a single call. The whole source is buffered in
//! memory first; there is no incremental insert.
//!
//! Failure semantics:
//! - strict mode: the first coercion or validation failure aborts the run
//!   before the sink is ever called, so a strict run delivers all rows or
//!   none
//! - lenient mode: best-effort; unusable cells were already substituted
//!   during coercion, rows that still fail validation are logged and
//!   skipped
//!
//! An unparseable numeric cell aborts in both modes (see [`crate::coerce`]).

use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

use crate::coerce::coerce;
use crate::error::{ProcessError, ProcessResult};
use crate::logs::{log_error_row, log_info, log_success, log_warning};
use crate::models::{Cell, ProcessingConfig, TypedRow};
use crate::parser::{parse_bytes_auto, parse_file_with, ParseResult};
use crate::schema::Schema;
use crate::sink::Sink;
use crate::validate::check_row;

// =============================================================================
// Results
// =============================================================================

/// CSV source information.
#[derive(Debug, Clone, Serialize)]
pub struct CsvInfo {
    pub encoding: String,
    pub delimiter: char,
    /// Total rows read from the source, header included.
    pub row_count: usize,
}

/// Outcome of a processing run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessSummary {
    /// Data rows examined (header excluded).
    pub rows_read: usize,
    /// Rows that passed coercion and validation.
    pub valid_count: usize,
    /// Rows dropped by lenient-mode validation failures.
    pub skipped_count: usize,
    /// Rows the sink reported written.
    pub inserted: u64,
    /// Target table name.
    pub table: String,
    /// Source metadata.
    pub csv_info: CsvInfo,
}

// =============================================================================
// Entry Points
// =============================================================================

/// Process a CSV file into the sink.
///
/// Parses with encoding/delimiter auto-detection (or a forced delimiter),
/// then runs the ingestion loop.
pub async fn process_file<S: Sink + ?Sized>(
    path: &Path,
    delimiter: Option<char>,
    schema: &Schema,
    config: &ProcessingConfig,
    sink: &S,
    table: &str,
) -> ProcessResult<ProcessSummary> {
    log_info(format!("Reading CSV file: {}", path.display()));
    let parsed = parse_file_with(path, delimiter)?;
    process_parsed(parsed, schema, config, sink, table).await
}

/// Process CSV bytes into the sink.
pub async fn process_bytes<S: Sink + ?Sized>(
    bytes: &[u8],
    schema: &Schema,
    config: &ProcessingConfig,
    sink: &S,
    table: &str,
) -> ProcessResult<ProcessSummary> {
    let parsed = parse_bytes_auto(bytes)?;
    process_parsed(parsed, schema, config, sink, table).await
}

/// Process already-parsed raw rows into the sink.
pub async fn process_rows<S: Sink + ?Sized>(
    rows: Vec<Vec<String>>,
    schema: &Schema,
    config: &ProcessingConfig,
    sink: &S,
    table: &str,
) -> ProcessResult<ProcessSummary> {
    let parsed = ParseResult {
        rows,
        encoding: "utf-8".to_string(),
        delimiter: ',',
    };
    process_parsed(parsed, schema, config, sink, table).await
}

/// Internal: run the ingestion loop over parsed rows.
async fn process_parsed<S: Sink + ?Sized>(
    parsed: ParseResult,
    schema: &Schema,
    config: &ProcessingConfig,
    sink: &S,
    table: &str,
) -> ProcessResult<ProcessSummary> {
    if parsed.rows.is_empty() {
        return Err(ProcessError::EmptyInput);
    }

    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!(
        "Detected delimiter: '{}'",
        format_delimiter(parsed.delimiter)
    ));
    log_success(format!("Read {} rows", parsed.rows.len()));

    let csv_info = CsvInfo {
        encoding: parsed.encoding.clone(),
        delimiter: parsed.delimiter,
        row_count: parsed.rows.len(),
    };

    let has_header = config.csv_has_header || seems_to_be_header(&parsed.rows[0], schema);
    let start = if has_header {
        log_info("Header row detected, skipping it");
        1
    } else {
        0
    };

    let mut batch: Vec<Vec<Cell>> = Vec::new();
    let mut skipped = 0usize;

    for (idx, raw) in parsed.rows[start..].iter().enumerate() {
        // 1-based source row number, header included
        let row_number = start + idx + 1;

        let typed = coerce_row(raw, row_number, schema, config)?;

        match check_row(&typed, schema) {
            Ok(()) => batch.push(typed.into_cells()),
            Err(violation) => {
                log_error_row(
                    format!("Data validation failed ({}): {:?}", violation, raw),
                    row_number,
                );
                if config.strict_mode {
                    return Err(ProcessError::RowInvalid {
                        row: row_number,
                        reason: violation.to_string(),
                    });
                }
                skipped += 1;
            }
        }
    }

    let rows_read = parsed.rows.len() - start;
    if skipped > 0 {
        log_warning(format!("Skipped {} of {} rows", skipped, rows_read));
    }

    log_info(format!("Inserting {} rows into '{}'", batch.len(), table));
    let inserted = sink.insert(table, &batch, schema).await?;
    log_success(format!("Inserted {} rows into '{}'", inserted, table));

    Ok(ProcessSummary {
        rows_read,
        valid_count: batch.len(),
        skipped_count: skipped,
        inserted,
        table: table.to_string(),
        csv_info,
    })
}

// =============================================================================
// Per-Row Steps
// =============================================================================

/// Whether a first row looks like a header: its cell set equals the
/// schema's field-name set exactly.
pub fn seems_to_be_header(row: &[String], schema: &Schema) -> bool {
    let cells: HashSet<&str> = row.iter().map(String::as_str).collect();
    let expected: HashSet<&str> = schema.field_names().into_iter().collect();
    cells == expected
}

/// Coerce one raw row into a typed row.
///
/// Cells pair with schema fields positionally, stopping at the shorter of
/// the two; extra cells and uncovered trailing fields are ignored.
pub fn coerce_row(
    raw: &[String],
    row_number: usize,
    schema: &Schema,
    config: &ProcessingConfig,
) -> ProcessResult<TypedRow> {
    let mut typed = TypedRow::with_capacity(raw.len().min(schema.len()));

    for (cell, spec) in raw.iter().zip(schema.fields()) {
        let value = coerce(Some(cell.as_str()), spec, config).map_err(|source| {
            log_error_row(format!("Cannot coerce cell '{}'", cell), row_number);
            ProcessError::Coercion { row: row_number, source }
        })?;
        typed.push(spec.name.clone(), value);
    }

    Ok(typed)
}

/// Display form of a delimiter.
fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "TAB",
        '|' => "|",
        _ => "?",
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::io::Write;

    fn rows(lines: &[&str]) -> Vec<Vec<String>> {
        lines
            .iter()
            .map(|line| line.split(',').map(str::to_string).collect())
            .collect()
    }

    fn lenient_no_header() -> ProcessingConfig {
        ProcessingConfig { csv_has_header: false, ..ProcessingConfig::default() }
    }

    #[test]
    fn test_header_detected_by_field_set() {
        let schema = Schema::example();
        let header = rows(&["id,username,email,is_active,user_role,created_at"]);
        assert!(seems_to_be_header(&header[0], &schema));

        let data = rows(&["1,alice,alice@example.com,true,admin,2023-01-01"]);
        assert!(!seems_to_be_header(&data[0], &schema));
    }

    #[tokio::test]
    async fn test_header_skipped_even_when_flag_off() {
        let schema = Schema::example();
        let sink = MemorySink::new();
        let input = rows(&[
            "id,username,email,is_active,user_role,created_at",
            "1,alice,alice@example.com,true,admin,2023-01-01T00:00:00Z",
        ]);

        let summary = process_rows(input, &schema, &lenient_no_header(), &sink, "users")
            .await
            .unwrap();

        assert_eq!(summary.rows_read, 1);
        assert_eq!(summary.valid_count, 1);
        assert_eq!(sink.rows("users").len(), 1);
    }

    #[tokio::test]
    async fn test_first_row_kept_as_data_without_header() {
        let schema = Schema::example();
        let sink = MemorySink::new();
        let input = rows(&[
            "1,alice,alice@example.com,true,admin,2023-01-01T00:00:00Z",
            "2,bob,bob@example.com,false,user,2023-01-02T00:00:00Z",
        ]);

        let summary = process_rows(input, &schema, &lenient_no_header(), &sink, "users")
            .await
            .unwrap();

        assert_eq!(summary.rows_read, 2);
        assert_eq!(summary.valid_count, 2);
    }

    #[tokio::test]
    async fn test_lenient_skips_invalid_row() {
        // Scenario: second row has a malformed email; lenient mode drops
        // it and delivers the rest.
        let schema = Schema::example();
        let sink = MemorySink::new();
        let input = rows(&[
            "id,username,email,is_active,user_role,created_at",
            "1,alice,alice@example.com,true,admin,2023-01-01T00:00:00Z",
            "2,bob,not-an-email,false,user,2023-01-02T00:00:00Z",
        ]);

        let summary = process_rows(input, &schema, &ProcessingConfig::default(), &sink, "users")
            .await
            .unwrap();

        assert_eq!(summary.valid_count, 1);
        assert_eq!(summary.skipped_count, 1);

        let stored = sink.rows("users");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0][0], Cell::Int(1));
        assert_eq!(stored[0][1], Cell::Str("alice".into()));
        assert_eq!(stored[0][2], Cell::Str("alice@example.com".into()));
    }

    #[tokio::test]
    async fn test_strict_aborts_and_delivers_nothing() {
        let schema = Schema::example();
        let sink = MemorySink::new();
        let config = ProcessingConfig { strict_mode: true, ..ProcessingConfig::default() };
        let input = rows(&[
            "id,username,email,is_active,user_role,created_at",
            "1,alice,alice@example.com,true,admin,2023-01-01T00:00:00Z",
            "2,bob,not-an-email,false,user,2023-01-02T00:00:00Z",
        ]);

        let result = process_rows(input, &schema, &config, &sink, "users").await;

        assert!(matches!(result, Err(ProcessError::RowInvalid { row: 3, .. })));
        // The sink is never called: no table, no rows.
        assert!(!sink.table_exists("users"));
        assert!(sink.rows("users").is_empty());
    }

    #[tokio::test]
    async fn test_zero_for_null_numerics_flag() {
        let decl = serde_json::json!({
            "properties": {
                "id": { "type": "integer" },
                "name": { "type": "string" }
            },
            "required": ["id"]
        });
        let schema = Schema::from_declaration(&decl, true).unwrap();
        let input = rows(&[",alice"]);

        // Flag on: empty id becomes 0 and the row is delivered.
        let sink = MemorySink::new();
        let config = ProcessingConfig {
            use_zero_for_null_numerics: true,
            csv_has_header: false,
            ..ProcessingConfig::default()
        };
        let summary = process_rows(input.clone(), &schema, &config, &sink, "t")
            .await
            .unwrap();
        assert_eq!(summary.valid_count, 1);
        assert_eq!(sink.rows("t")[0][0], Cell::Int(0));

        // Flag off: empty id is null, the required check fails, the row
        // is skipped.
        let sink = MemorySink::new();
        let summary = process_rows(input, &schema, &lenient_no_header(), &sink, "t")
            .await
            .unwrap();
        assert_eq!(summary.valid_count, 0);
        assert_eq!(summary.skipped_count, 1);
    }

    #[tokio::test]
    async fn test_unparseable_numeric_aborts_lenient_run() {
        let schema = Schema::example();
        let sink = MemorySink::new();
        let input = rows(&["abc,alice,alice@example.com,true,admin,2023-01-01T00:00:00Z"]);

        let result = process_rows(input, &schema, &lenient_no_header(), &sink, "users").await;
        assert!(matches!(result, Err(ProcessError::Coercion { row: 1, .. })));
        assert!(sink.rows("users").is_empty());
    }

    #[tokio::test]
    async fn test_short_rows_truncate_to_pairing() {
        // Only two cells for a six-field schema: trailing required fields
        // are absent, so validation drops the row in lenient mode.
        let schema = Schema::example();
        let sink = MemorySink::new();
        let input = rows(&["1,alice"]);

        let summary = process_rows(input, &schema, &lenient_no_header(), &sink, "users")
            .await
            .unwrap();
        assert_eq!(summary.skipped_count, 1);
    }

    #[tokio::test]
    async fn test_extra_cells_ignored() {
        let decl = serde_json::json!({
            "properties": { "id": { "type": "integer" } }
        });
        let schema = Schema::from_declaration(&decl, true).unwrap();
        let sink = MemorySink::new();
        let input = rows(&["7,extra,cells"]);

        let summary = process_rows(input, &schema, &lenient_no_header(), &sink, "t")
            .await
            .unwrap();
        assert_eq!(summary.valid_count, 1);
        assert_eq!(sink.rows("t")[0], vec![Cell::Int(7)]);
    }

    #[tokio::test]
    async fn test_empty_input_is_an_error() {
        let schema = Schema::example();
        let sink = MemorySink::new();
        let result = process_rows(vec![], &schema, &ProcessingConfig::default(), &sink, "users").await;
        assert!(matches!(result, Err(ProcessError::EmptyInput)));
    }

    #[tokio::test]
    async fn test_header_only_input_inserts_empty_batch() {
        let schema = Schema::example();
        let sink = MemorySink::new();
        let input = rows(&["id,username,email,is_active,user_role,created_at"]);

        let summary = process_rows(input, &schema, &ProcessingConfig::default(), &sink, "users")
            .await
            .unwrap();
        assert_eq!(summary.rows_read, 0);
        assert_eq!(summary.inserted, 0);
        // ensure-then-insert still creates the table
        assert!(sink.table_exists("users"));
    }

    #[tokio::test]
    async fn test_process_file_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "id,username,email,is_active,user_role,created_at").unwrap();
        writeln!(file, "1,alice,alice@example.com,true,admin,2023-01-01 10:00:00").unwrap();
        writeln!(file, "2,bob,bob@example.com,0,user,2023-06-15").unwrap();

        let schema = Schema::example();
        let sink = MemorySink::new();
        let summary = process_file(
            &path,
            None,
            &schema,
            &ProcessingConfig::default(),
            &sink,
            "users",
        )
        .await
        .unwrap();

        assert_eq!(summary.valid_count, 2);
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.csv_info.delimiter, ',');

        let stored = sink.rows("users");
        // datetimes arrive in canonical form
        assert_eq!(stored[0][5], Cell::Str("2023-01-01T10:00:00Z".into()));
        assert_eq!(stored[1][5], Cell::Str("2023-06-15T00:00:00Z".into()));
        assert_eq!(stored[1][3], Cell::Bool(false));
    }
}
