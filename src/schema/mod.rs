//! Declarative table schemas.
//!
//! A schema is declared as a restricted JSON-Schema-style object:
//!
//! ```json
//! {
//!   "title": "User",
//!   "type": "object",
//!   "properties": {
//!     "id": { "type": "integer" },
//!     "email": { "type": "string", "format": "email" },
//!     "user_role": { "type": "string", "enum": ["admin", "user"] }
//!   },
//!   "required": ["id", "email"]
//! }
//! ```
//!
//! Declarations are validated against a meta-schema embedded at compile
//! time (`schemas/table-schema.json`, JSON Schema Draft 7) before being
//! lowered into the typed [`Schema`] model. Property order is preserved
//! and defines the positional alignment with CSV columns.
//!
//! Field types form a closed enum: every supported type has exactly one
//! coercion rule, matched exhaustively. A declaration naming an unknown
//! type fails to load in strict mode; in lenient mode the field is dropped
//! with a warning and ignored for the rest of the run.

use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

use crate::error::{SchemaError, SchemaResult};
use crate::logs::log_warning;

// =============================================================================
// Field Types and Formats
// =============================================================================

/// Primitive type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// Whole numbers only.
    Integer,
    /// Integers or floating-point numbers.
    Number,
    String,
    Boolean,
}

impl FieldType {
    /// Map a declared type name to its variant.
    pub fn from_declared(name: &str) -> Option<Self> {
        match name {
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "string" => Some(Self::String),
            "boolean" => Some(Self::Boolean),
            _ => None,
        }
    }

    /// Declared name of this type.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
            Self::String => "string",
            Self::Boolean => "boolean",
        }
    }
}

/// Optional string format of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    Email,
    DateTime,
}

impl FieldFormat {
    pub fn from_declared(name: &str) -> Option<Self> {
        match name {
            "email" => Some(Self::Email),
            "date-time" => Some(Self::DateTime),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::DateTime => "date-time",
        }
    }
}

// =============================================================================
// Field Specification
// =============================================================================

/// A single field of a table schema. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Field (and column) name.
    pub name: String,
    /// Primitive type.
    pub field_type: FieldType,
    /// Optional string format.
    pub format: Option<FieldFormat>,
    /// Allowed values. When set, the field is coerced as an enum
    /// regardless of its declared primitive type.
    pub enum_values: Option<Vec<String>>,
    /// Whether the field must be present in every record.
    pub required: bool,
}

impl FieldSpec {
    pub fn is_datetime(&self) -> bool {
        self.format == Some(FieldFormat::DateTime)
    }

    pub fn is_enum(&self) -> bool {
        self.enum_values.is_some()
    }
}

// =============================================================================
// Schema
// =============================================================================

/// An ordered table schema.
///
/// Invariants: field names are unique (JSON object keys), the required
/// set is a subset of the declared field names, and field order matches
/// the declaration's property order.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Schema title, used as a fallback table name.
    pub title: Option<String>,
    fields: Vec<FieldSpec>,
    required: HashSet<String>,
}

impl Schema {
    /// Load a schema from a JSON declaration.
    ///
    /// The declaration is first checked against the embedded meta-schema,
    /// then lowered into the typed model. `strict` controls the handling
    /// of unsupported field types: error out, or drop the field with a
    /// warning.
    pub fn from_declaration(decl: &Value, strict: bool) -> SchemaResult<Schema> {
        validate_declaration(decl)?;

        let obj = decl.as_object().ok_or(SchemaError::NotAnObject)?;
        let properties = obj
            .get("properties")
            .and_then(Value::as_object)
            .ok_or(SchemaError::NotAnObject)?;

        let title = obj
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut required: HashSet<String> = obj
            .get("required")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        // Required names must refer to declared properties.
        for name in &required {
            if !properties.contains_key(name) {
                return Err(SchemaError::UnknownRequired(name.clone()));
            }
        }

        let mut fields = Vec::with_capacity(properties.len());
        for (name, detail) in properties {
            let declared = detail
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("string");

            let field_type = match FieldType::from_declared(declared) {
                Some(t) => t,
                None => {
                    if strict {
                        return Err(SchemaError::UnsupportedType {
                            field: name.clone(),
                            declared: declared.to_string(),
                        });
                    }
                    log_warning(format!(
                        "No coercion rule for type '{}', dropping field '{}'",
                        declared, name
                    ));
                    required.remove(name);
                    continue;
                }
            };

            let format = detail
                .get("format")
                .and_then(Value::as_str)
                .and_then(FieldFormat::from_declared);

            let enum_values = match detail.get("enum").and_then(Value::as_array) {
                Some(values) => {
                    let values: Vec<String> = values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect();
                    if values.is_empty() {
                        return Err(SchemaError::EmptyEnum(name.clone()));
                    }
                    Some(values)
                }
                None => None,
            };

            fields.push(FieldSpec {
                name: name.clone(),
                field_type,
                format,
                enum_values,
                required: required.contains(name),
            });
        }

        Ok(Schema { title, fields, required })
    }

    /// Load a schema from a JSON string.
    pub fn from_json(json: &str, strict: bool) -> SchemaResult<Schema> {
        let decl: Value = serde_json::from_str(json)?;
        Self::from_declaration(&decl, strict)
    }

    /// Load a schema from a JSON file.
    pub fn from_file(path: impl AsRef<Path>, strict: bool) -> SchemaResult<Schema> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content, strict)
    }

    /// The embedded example schema (a `users` table).
    pub fn example() -> Schema {
        Self::from_json(EXAMPLE_DECLARATION, true).expect("Invalid embedded schema")
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// The example declaration embedded at compile time.
pub const EXAMPLE_DECLARATION: &str = include_str!("../../schemas/users.json");

/// Check a declaration against the embedded meta-schema.
fn validate_declaration(decl: &Value) -> SchemaResult<()> {
    let meta: Value = serde_json::from_str(include_str!("../../schemas/table-schema.json"))
        .expect("Invalid embedded meta-schema");

    let validator = jsonschema::draft7::new(&meta)
        .map_err(|e| SchemaError::InvalidDeclaration { errors: vec![e.to_string()] })?;

    let errors: Vec<String> = validator
        .iter_errors(decl)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::InvalidDeclaration { errors })
    }
}

// =============================================================================
// Tests
// =============================================================================
