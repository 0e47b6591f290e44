//! Typed-row validation against a table schema.
//!
//! Validation is pure: it never mutates the row and never panics. The
//! contract is one row per call; the processor decides what a violation
//! means for the run (strict abort vs. skip).
//!
//! A `Null` cell is treated as an absent value: a required field with a
//! null is a violation, an optional field with a null passes without
//! further checks. Lenient coercion substitutes nulls for unusable cells,
//! so optional fields degrade gracefully while required ones still fail.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::logs::log_error;
use crate::models::{Cell, TypedRow};
use crate::schema::{FieldFormat, FieldType, Schema};

// =============================================================================
// Format Patterns
// =============================================================================

/// `local@domain.tld` shape: one `@`, a dot after it, non-empty parts.
static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@]+@[^@]+\.[^@]+$").expect("Invalid email pattern"));

/// Canonical date-time: `YYYY-MM-DDTHH:MM:SS` with optional `Z` or `±HH:MM`.
static DATETIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(Z|[+-]\d{2}:\d{2})?$")
        .expect("Invalid date-time pattern")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

pub fn is_valid_datetime(dt_str: &str) -> bool {
    DATETIME_PATTERN.is_match(dt_str)
}

// =============================================================================
// Row Validation
// =============================================================================

/// A single validation violation: the first constraint a row broke.
#[derive(Debug, Clone, PartialEq)]
pub struct RowViolation {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for RowViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "field '{}': {}", self.field, self.message)
    }
}

impl RowViolation {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self { field: field.to_string(), message: message.into() }
    }
}

/// Check a typed row against the schema.
///
/// Walks fields in schema order and short-circuits on the first violation:
/// required presence, then type, then format.
pub fn check_row(row: &TypedRow, schema: &Schema) -> Result<(), RowViolation> {
    for field in schema.fields() {
        let value = match row.get(&field.name) {
            None | Some(Cell::Null) => {
                if field.required {
                    return Err(RowViolation::new(
                        &field.name,
                        "required but missing from data",
                    ));
                }
                continue;
            }
            Some(value) => value,
        };

        let type_ok = match field.field_type {
            FieldType::Integer => matches!(value, Cell::Int(_)),
            FieldType::Number => matches!(value, Cell::Int(_) | Cell::Float(_)),
            FieldType::String => matches!(value, Cell::Str(_)),
            FieldType::Boolean => matches!(value, Cell::Bool(_)),
        };
        if !type_ok {
            return Err(RowViolation::new(
                &field.name,
                format!(
                    "expected {}, got {} ('{}')",
                    field.field_type.name(),
                    value.type_name(),
                    value
                ),
            ));
        }

        if let (Some(format), Cell::Str(s)) = (field.format, value) {
            match format {
                FieldFormat::Email if !is_valid_email(s) => {
                    return Err(RowViolation::new(
                        &field.name,
                        format!("invalid email format ('{}')", s),
                    ));
                }
                FieldFormat::DateTime if !is_valid_datetime(s) => {
                    return Err(RowViolation::new(
                        &field.name,
                        format!("invalid date-time format ('{}')", s),
                    ));
                }
                _ => {}
            }
        }
    }

    Ok(())
}

/// Logging wrapper around [`check_row`]: true when the row is valid,
/// false (with the violation logged) otherwise.
pub fn validate(row: &TypedRow, schema: &Schema) -> bool {
    match check_row(row, schema) {
        Ok(()) => true,
        Err(violation) => {
            log_error(format!("Validation error for {}", violation));
            false
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn user_row(id: Cell, username: Cell, email: Cell) -> TypedRow {
        let mut row = TypedRow::new();
        row.push("id", id);
        row.push("username", username);
        row.push("email", email);
        row
    }

    #[test]
    fn test_valid_row() {
        let schema = Schema::example();
        let mut row = user_row(
            Cell::Int(1),
            Cell::Str("alice".into()),
            Cell::Str("alice@example.com".into()),
        );
        row.push("is_active", Cell::Bool(true));
        row.push("user_role", Cell::Str("admin".into()));
        row.push("created_at", Cell::Str("2023-05-01T10:30:00Z".into()));

        assert!(check_row(&row, &schema).is_ok());
        assert!(validate(&row, &schema));
    }

    #[test]
    fn test_required_field_missing() {
        let schema = Schema::example();
        let mut row = TypedRow::new();
        row.push("id", Cell::Int(1));
        // username and email (both required) absent entirely

        let violation = check_row(&row, &schema).unwrap_err();
        assert_eq!(violation.field, "username");
        assert!(violation.message.contains("required"));
    }

    #[test]
    fn test_required_null_counts_as_missing() {
        let schema = Schema::example();
        let row = user_row(Cell::Null, Cell::Str("bob".into()), Cell::Str("b@x.io".into()));

        let violation = check_row(&row, &schema).unwrap_err();
        assert_eq!(violation.field, "id");
    }

    #[test]
    fn test_optional_null_passes() {
        let schema = Schema::example();
        let mut row = user_row(
            Cell::Int(2),
            Cell::Str("bob".into()),
            Cell::Str("bob@example.com".into()),
        );
        row.push("is_active", Cell::Null);
        row.push("created_at", Cell::Null);

        assert!(check_row(&row, &schema).is_ok());
    }

    #[test]
    fn test_type_mismatches() {
        let schema = Schema::example();

        // integer field holding a string
        let row = user_row(
            Cell::Str("1".into()),
            Cell::Str("bob".into()),
            Cell::Str("bob@example.com".into()),
        );
        let violation = check_row(&row, &schema).unwrap_err();
        assert_eq!(violation.field, "id");
        assert!(violation.message.contains("expected integer"));

        // float where an integer is required
        let row = user_row(
            Cell::Float(1.5),
            Cell::Str("bob".into()),
            Cell::Str("bob@example.com".into()),
        );
        assert!(check_row(&row, &schema).is_err());
    }

    #[test]
    fn test_number_accepts_integer_or_float() {
        let decl = serde_json::json!({
            "properties": { "score": { "type": "number" } }
        });
        let schema = Schema::from_declaration(&decl, true).unwrap();

        let mut row = TypedRow::new();
        row.push("score", Cell::Int(3));
        assert!(check_row(&row, &schema).is_ok());

        let mut row = TypedRow::new();
        row.push("score", Cell::Float(3.5));
        assert!(check_row(&row, &schema).is_ok());

        let mut row = TypedRow::new();
        row.push("score", Cell::Bool(true));
        assert!(check_row(&row, &schema).is_err());
    }

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("alice@example.com"));
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("two@at@signs.com"));

        let schema = Schema::example();
        let row = user_row(
            Cell::Int(1),
            Cell::Str("bob".into()),
            Cell::Str("not-an-email".into()),
        );
        let violation = check_row(&row, &schema).unwrap_err();
        assert_eq!(violation.field, "email");
        assert!(violation.message.contains("email"));
    }

    #[test]
    fn test_datetime_format() {
        assert!(is_valid_datetime("2023-05-01T10:30:00"));
        assert!(is_valid_datetime("2023-05-01T10:30:00Z"));
        assert!(is_valid_datetime("2023-05-01T10:30:00+02:00"));
        assert!(is_valid_datetime("2023-05-01T10:30:00-05:30"));
        assert!(!is_valid_datetime("2023-05-01 10:30:00"));
        assert!(!is_valid_datetime("2023-05-01T10:30:00.123Z"));
        assert!(!is_valid_datetime("2023-05-01"));
    }

    #[test]
    fn test_short_circuits_on_first_violation() {
        let schema = Schema::example();
        // Both id and email invalid; id is declared first.
        let row = user_row(Cell::Null, Cell::Str("bob".into()), Cell::Str("bad".into()));
        let violation = check_row(&row, &schema).unwrap_err();
        assert_eq!(violation.field, "id");
    }
}
