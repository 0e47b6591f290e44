//! Domain models for the tabload ingestion pipeline.
//!
//! This module contains the core data structures used throughout the
//! pipeline:
//!
//! - [`Cell`] - A typed cell value produced by coercion
//! - [`TypedRow`] - An ordered field-name to [`Cell`] mapping
//! - [`ProcessingConfig`] - Per-run coercion and validation policy

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// Typed Cell Values
// =============================================================================

/// A typed value produced by coercing a raw CSV cell.
///
/// `Null` is the lenient-mode substitute for cells that could not be
/// coerced; validation treats it as an absent value.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Human-readable type name, used in validation messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Int(_) => "integer",
            Cell::Float(_) => "float",
            Cell::Str(_) => "string",
            Cell::Bool(_) => "boolean",
            Cell::Null => "null",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to a JSON value for display and debug output.
    pub fn to_json(&self) -> Value {
        match self {
            Cell::Int(i) => Value::from(*i),
            Cell::Float(f) => Value::from(*f),
            Cell::Str(s) => Value::from(s.clone()),
            Cell::Bool(b) => Value::from(*b),
            Cell::Null => Value::Null,
        }
    }

    /// Convert a scalar JSON value into a cell.
    ///
    /// Arrays and objects have no cell representation and return `None`.
    pub fn from_json(value: &Value) -> Option<Cell> {
        match value {
            Value::Null => Some(Cell::Null),
            Value::Bool(b) => Some(Cell::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Cell::Int(i))
                } else {
                    n.as_f64().map(Cell::Float)
                }
            }
            Value::String(s) => Some(Cell::Str(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Str(s) => write!(f, "{}", s),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Null => write!(f, "null"),
        }
    }
}

// =============================================================================
// Typed Rows
// =============================================================================

/// An ordered mapping from field name to typed cell value.
///
/// Produced fresh per source row by the processor, consumed once by the
/// validator, then reduced to its ordered tuple form for the sink batch.
/// Field order matches schema declaration order; rows shorter than the
/// schema simply lack the trailing fields.
#[derive(Debug, Clone, Default)]
pub struct TypedRow {
    entries: Vec<(String, Cell)>,
}

impl TypedRow {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity) }
    }

    pub fn push(&mut self, name: impl Into<String>, cell: Cell) {
        self.entries.push((name.into(), cell));
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.entries.iter().map(|(n, c)| (n.as_str(), c))
    }

    /// Reduce to the ordered tuple form kept in the output batch.
    pub fn into_cells(self) -> Vec<Cell> {
        self.entries.into_iter().map(|(_, c)| c).collect()
    }

    /// Convert to a JSON object, preserving field order.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        for (name, cell) in &self.entries {
            obj.insert(name.clone(), cell.to_json());
        }
        Value::Object(obj)
    }

    /// Build a row from a JSON object of scalar values.
    ///
    /// Returns `None` when any value is an array or object.
    pub fn from_json(obj: &Map<String, Value>) -> Option<Self> {
        let mut row = TypedRow::with_capacity(obj.len());
        for (name, value) in obj {
            row.push(name.clone(), Cell::from_json(value)?);
        }
        Some(row)
    }
}

// =============================================================================
// Processing Configuration
// =============================================================================

/// Per-run coercion and validation policy.
///
/// Constructed once at startup and passed explicitly to every per-row
/// operation; never mutated mid-run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Abort the whole run on the first coercion or validation failure.
    pub strict_mode: bool,

    /// Substitute `0` instead of null for empty numeric cells.
    pub use_zero_for_null_numerics: bool,

    /// Assume the first CSV row is a header.
    pub csv_has_header: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            strict_mode: false,
            use_zero_for_null_numerics: false,
            csv_has_header: true,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
