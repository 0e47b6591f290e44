//! PostgreSQL sink.
//!
//! Column types derive from the schema: `integer` becomes an
//! auto-incrementing `SERIAL`, strings are bounded text unless a format
//! upgrades them (`email` adds a uniqueness constraint, `date-time` maps
//! to `TIMESTAMP WITH TIME ZONE`). Required fields get `NOT NULL`.
//!
//! Inserts are bulk: one multi-row `INSERT` per batch, preceded by an
//! explicit existence check against `information_schema`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, QueryBuilder};

use crate::error::{SinkError, SinkResult};
use crate::logs::{log_info, log_success};
use crate::models::Cell;
use crate::schema::{FieldFormat, FieldSpec, FieldType, Schema};

use super::Sink;

/// Sink writing batches into a PostgreSQL database.
pub struct PostgresSink {
    pool: PgPool,
}

impl PostgresSink {
    /// Connect to the database at `url`.
    ///
    /// One writer touches the connection for the run's lifetime, so the
    /// pool is capped at a single connection.
    pub async fn connect(url: &str) -> SinkResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await
            .map_err(|e| SinkError::ConnectionError(e.to_string()))?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn table_exists(&self, table: &str) -> SinkResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = $1)",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create_table(&self, schema: &Schema, table: &str) -> SinkResult<()> {
        let ddl = create_table_sql(schema, table);
        log_info(format!("Creating table: {}", ddl));
        sqlx::query(&ddl).execute(&self.pool).await?;
        log_success(format!("Created table '{}'", table));
        Ok(())
    }
}

#[async_trait]
impl Sink for PostgresSink {
    async fn ensure_table_exists(&self, schema: &Schema, table: &str) -> SinkResult<()> {
        if !self.table_exists(table).await? {
            self.create_table(schema, table).await?;
        }
        Ok(())
    }

    async fn insert(&self, table: &str, rows: &[Vec<Cell>], schema: &Schema) -> SinkResult<u64> {
        self.ensure_table_exists(schema, table).await?;

        if rows.is_empty() {
            return Ok(0);
        }

        let prepared = prepare_rows(rows, schema)?;

        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) VALUES ",
            table,
            schema.field_names().join(", ")
        ));

        for (i, row) in prepared.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push("(");
            for (j, cell) in row.iter().enumerate() {
                if j > 0 {
                    builder.push(", ");
                }
                match cell {
                    Bound::Int(v) => {
                        builder.push_bind(*v);
                    }
                    Bound::Float(v) => {
                        builder.push_bind(*v);
                    }
                    Bound::Bool(v) => {
                        builder.push_bind(*v);
                    }
                    Bound::Text(v) => {
                        builder.push_bind(v.to_string());
                    }
                    Bound::Timestamp(v) => {
                        builder.push_bind(*v);
                    }
                    Bound::Null => {
                        builder.push("NULL");
                    }
                }
            }
            builder.push(")");
        }

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

/// A cell ready to bind against its column type.
enum Bound<'a> {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(&'a str),
    Timestamp(DateTime<Utc>),
    Null,
}

/// Pair cells with their columns and pre-parse timestamp strings, so bind
/// problems surface as typed errors before any SQL is sent.
fn prepare_rows<'a>(rows: &'a [Vec<Cell>], schema: &Schema) -> SinkResult<Vec<Vec<Bound<'a>>>> {
    rows.iter()
        .map(|row| {
            row.iter()
                .zip(schema.fields())
                .map(|(cell, field)| prepare_cell(cell, field))
                .collect()
        })
        .collect()
}

fn prepare_cell<'a>(cell: &'a Cell, field: &FieldSpec) -> SinkResult<Bound<'a>> {
    Ok(match cell {
        Cell::Int(v) => Bound::Int(*v),
        Cell::Float(v) => Bound::Float(*v),
        Cell::Bool(v) => Bound::Bool(*v),
        Cell::Null => Bound::Null,
        Cell::Str(s) if field.is_datetime() => {
            let dt = DateTime::parse_from_rfc3339(s).map_err(|e| SinkError::BadCell {
                column: field.name.clone(),
                value: s.clone(),
                message: e.to_string(),
            })?;
            Bound::Timestamp(dt.with_timezone(&Utc))
        }
        Cell::Str(s) => Bound::Text(s),
    })
}

// =============================================================================
// DDL Generation
// =============================================================================

/// SQL column type for a field.
pub fn column_sql_type(field: &FieldSpec) -> &'static str {
    match field.field_type {
        FieldType::Integer => "SERIAL",
        FieldType::Number => "DOUBLE PRECISION",
        FieldType::Boolean => "BOOLEAN",
        FieldType::String => match field.format {
            Some(FieldFormat::DateTime) => "TIMESTAMP WITH TIME ZONE",
            _ => "VARCHAR(255)",
        },
    }
}

/// `CREATE TABLE` statement for a schema.
pub fn create_table_sql(schema: &Schema, table: &str) -> String {
    let columns: Vec<String> = schema
        .fields()
        .iter()
        .map(|field| {
            let mut part = format!("{} {}", field.name, column_sql_type(field));
            if field.format == Some(FieldFormat::Email) {
                part.push_str(" UNIQUE");
            }
            if field.required {
                part.push_str(" NOT NULL");
            }
            part
        })
        .collect();

    format!("CREATE TABLE {} ({})", table, columns.join(", "))
}
