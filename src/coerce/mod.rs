//! Schema-driven cell coercion.
//!
//! Converts a single raw CSV cell into a typed [`Cell`] according to its
//! [`FieldSpec`], under the run's [`ProcessingConfig`]:
//!
//! - strict mode raises on anything that cannot be coerced faithfully
//! - lenient mode substitutes a type-appropriate default and continues
//!
//! Dispatch precedence: a declared enum wins over everything, then the
//! `date-time` format, then the primitive type. The primitive match is
//! exhaustive over [`FieldType`].
//!
//! One asymmetry: a non-empty numeric cell that does not parse as a number
//! is fatal in both modes. There is no sensible default for `"abc"` in an
//! integer column, while empty-ish cells have one.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use crate::error::{CoerceResult, CoercionError};
use crate::logs::{log_error, log_warning};
use crate::models::{Cell, ProcessingConfig};
use crate::schema::{FieldSpec, FieldType};

// =============================================================================
// Literal Sets
// =============================================================================

/// Cells interpreted as boolean true.
pub const TRUE_LITERALS: &[&str] = &["true", "True", "TRUE", "1", "t"];

/// Cells interpreted as boolean false.
pub const FALSE_LITERALS: &[&str] = &["false", "False", "FALSE", "0", "f"];

/// Cells interpreted as a missing numeric value. An absent cell counts too.
pub const NULL_SENTINELS: &[&str] = &["", "NaN", "null"];

// =============================================================================
// Coercion
// =============================================================================

/// Coerce a raw cell to a typed value.
///
/// `raw` is `None` when the source row had no cell for this field.
pub fn coerce(
    raw: Option<&str>,
    spec: &FieldSpec,
    config: &ProcessingConfig,
) -> CoerceResult<Cell> {
    if let Some(allowed) = &spec.enum_values {
        return coerce_enum(raw, spec, allowed, config);
    }
    if spec.is_datetime() {
        return coerce_datetime(raw, spec, config);
    }
    match spec.field_type {
        FieldType::Integer | FieldType::Number => coerce_numeric(raw, spec, config),
        FieldType::Boolean => coerce_boolean(raw, spec, config),
        FieldType::String => coerce_string(raw, spec, config),
    }
}

fn coerce_string(
    raw: Option<&str>,
    spec: &FieldSpec,
    config: &ProcessingConfig,
) -> CoerceResult<Cell> {
    match raw {
        None | Some("") => {
            if config.strict_mode {
                log_error(format!("Empty cell in field '{}'", spec.name));
                return Err(CoercionError::EmptyCell { field: spec.name.clone() });
            }
            Ok(Cell::Str(String::new()))
        }
        Some(s) => Ok(Cell::Str(s.to_string())),
    }
}

fn coerce_numeric(
    raw: Option<&str>,
    spec: &FieldSpec,
    config: &ProcessingConfig,
) -> CoerceResult<Cell> {
    let cell = raw.unwrap_or("");

    if NULL_SENTINELS.contains(&cell) {
        if config.strict_mode {
            log_error(format!("Field '{}' requires a numeric value", spec.name));
            return Err(CoercionError::RequiredNumeric { field: spec.name.clone() });
        }
        log_warning(format!(
            "Null numeric cell in field '{}', substituting {}",
            spec.name,
            if config.use_zero_for_null_numerics { "0" } else { "null" }
        ));
        return Ok(if config.use_zero_for_null_numerics {
            Cell::Int(0)
        } else {
            Cell::Null
        });
    }

    let parsed: f64 = cell.parse().map_err(|_| {
        log_error(format!(
            "Field '{}' cannot parse '{}' as a number",
            spec.name, cell
        ));
        CoercionError::NumericFormat {
            field: spec.name.clone(),
            value: cell.to_string(),
        }
    })?;

    // Integral values become integers, everything else stays a float.
    if parsed.trunc() == parsed && parsed >= i64::MIN as f64 && parsed < i64::MAX as f64 {
        Ok(Cell::Int(parsed as i64))
    } else {
        Ok(Cell::Float(parsed))
    }
}

fn coerce_boolean(
    raw: Option<&str>,
    spec: &FieldSpec,
    config: &ProcessingConfig,
) -> CoerceResult<Cell> {
    let cell = raw.unwrap_or("");

    if TRUE_LITERALS.contains(&cell) {
        return Ok(Cell::Bool(true));
    }
    if FALSE_LITERALS.contains(&cell) {
        return Ok(Cell::Bool(false));
    }

    if config.strict_mode {
        log_error(format!(
            "Field '{}' cannot interpret '{}' as a boolean",
            spec.name, cell
        ));
        return Err(CoercionError::InvalidBoolean {
            field: spec.name.clone(),
            value: cell.to_string(),
        });
    }
    log_warning(format!(
        "Field '{}' cannot interpret '{}' as a boolean, substituting null",
        spec.name, cell
    ));
    Ok(Cell::Null)
}

fn coerce_enum(
    raw: Option<&str>,
    spec: &FieldSpec,
    allowed: &[String],
    config: &ProcessingConfig,
) -> CoerceResult<Cell> {
    let cell = raw.unwrap_or("");

    if allowed.iter().any(|v| v == cell) {
        return Ok(Cell::Str(cell.to_string()));
    }

    let message = format!(
        "Unexpected enum value '{}' for field '{}'. Allowed values: {:?}",
        cell, spec.name, allowed
    );
    if config.strict_mode {
        log_error(message);
        return Err(CoercionError::InvalidEnum {
            field: spec.name.clone(),
            value: cell.to_string(),
            allowed: allowed.to_vec(),
        });
    }
    log_warning(message);
    Ok(Cell::Null)
}

fn coerce_datetime(
    raw: Option<&str>,
    spec: &FieldSpec,
    config: &ProcessingConfig,
) -> CoerceResult<Cell> {
    let cell = raw.unwrap_or("");

    match parse_timestamp(cell) {
        Some(dt) => Ok(Cell::Str(dt.to_rfc3339_opts(SecondsFormat::Secs, true))),
        None => {
            let message = format!(
                "Field '{}' cannot parse '{}' as a date-time",
                spec.name, cell
            );
            if config.strict_mode {
                log_error(message);
                return Err(CoercionError::DatetimeParse {
                    field: spec.name.clone(),
                    value: cell.to_string(),
                });
            }
            log_warning(message);
            Ok(Cell::Null)
        }
    }
}

// =============================================================================
// Timestamp Parsing
// =============================================================================

/// Timestamp formats carrying their own offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M%z",
];

/// Naive timestamp formats, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d %b %Y %H:%M:%S",
];

/// Date-only formats, interpreted as UTC midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %b %Y", "%B %d, %Y"];

/// Best-effort parse of a calendar timestamp.
///
/// Tries RFC 3339 and RFC 2822 first, then a fixed list of common layouts.
/// Naive inputs are assumed to be UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt);
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc).fixed_offset());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            let ndt = date.and_hms_opt(0, 0, 0)?;
            return Some(DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc).fixed_offset());
        }
    }

    None
}

// =============================================================================
// Tests
// =============================================================================
