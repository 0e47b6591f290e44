//! CSV reading with encoding and delimiter auto-detection.
//!
//! Produces positional rows of raw string cells. No schema logic here:
//! header detection and typing belong to the processor. Cells are trimmed
//! and blank lines are skipped; quoting is handled by the `csv` reader.

use std::path::{Path, PathBuf};

use crate::error::{CsvError, CsvResult};

/// Result of reading a CSV source, with detection metadata.
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Raw rows, including any header row.
    pub rows: Vec<Vec<String>>,
    /// Detected or assumed encoding.
    pub encoding: String,
    /// Detected or given delimiter.
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the specified encoding.
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => Ok(String::from_utf8_lossy(bytes).to_string()),
        "iso-8859-1" | "latin-1" | "latin1" => {
            Ok(encoding_rs::ISO_8859_15.decode(bytes).0.to_string())
        }
        "windows-1252" | "cp1252" => Ok(encoding_rs::WINDOWS_1252.decode(bytes).0.to_string()),
        _ => {
            // Fallback: UTF-8 with lossy conversion
            Ok(String::from_utf8_lossy(bytes).to_string())
        }
    }
}

/// Detect the delimiter by counting occurrences in the first line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Read rows from CSV content with an explicit delimiter.
///
/// Cells are trimmed; rows whose cells are all empty are skipped.
pub fn read_rows(content: &str, delimiter: char) -> CsvResult<Vec<Vec<String>>> {
    let delimiter = if delimiter.is_ascii() { delimiter as u8 } else { b',' };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| CsvError::ReadError {
            line: idx + 1,
            message: e.to_string(),
        })?;

        let cells: Vec<String> = record.iter().map(|s| s.trim().to_string()).collect();
        if cells.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(cells);
    }

    Ok(rows)
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;

    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let delimiter = detect_delimiter(&content);
    let rows = read_rows(&content, delimiter)?;

    Ok(ParseResult { rows, encoding, delimiter })
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes)
}

/// Parse a CSV file, forcing the given delimiter when provided.
pub fn parse_file_with<P: AsRef<Path>>(path: P, delimiter: Option<char>) -> CsvResult<ParseResult> {
    match delimiter {
        None => parse_file_auto(path),
        Some(delimiter) => {
            let bytes = std::fs::read(path.as_ref())?;
            if bytes.is_empty() {
                return Err(CsvError::EmptyFile);
            }
            let encoding = detect_encoding(&bytes);
            let content = decode_content(&bytes, &encoding)?;
            let rows = read_rows(&content, delimiter)?;
            Ok(ParseResult { rows, encoding, delimiter })
        }
    }
}

/// Find the first `.csv` file in a directory (alphabetical order).
///
/// Used when no input path is given on the command line.
pub fn discover_csv(dir: impl AsRef<Path>) -> CsvResult<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir.as_ref())?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();

    candidates.sort();
    candidates.into_iter().next().ok_or(CsvError::NoCsvFound)
}
