//! Storage sinks for processed batches.
//!
//! The processor hands its accumulated batch to a [`Sink`] in a single
//! call. The contract is an explicit two-step: `insert` ensures the table
//! exists before writing, so the core never depends on a backend's
//! missing-table error taxonomy.
//!
//! - [`PostgresSink`] - writes to PostgreSQL via sqlx
//! - [`MemorySink`] - keeps batches in memory, for tests and dry runs

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::error::SinkResult;
use crate::models::Cell;
use crate::schema::Schema;

mod postgres;

pub use postgres::{column_sql_type, create_table_sql, PostgresSink};

// =============================================================================
// Sink Trait
// =============================================================================

/// Destination for validated row batches.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Create the table for `schema` if and only if it does not exist.
    /// Idempotent: a second call with the same arguments is a no-op.
    async fn ensure_table_exists(&self, schema: &Schema, table: &str) -> SinkResult<()>;

    /// Bulk-insert rows in schema column order, creating the table first
    /// when needed. Returns the number of rows written.
    async fn insert(&self, table: &str, rows: &[Vec<Cell>], schema: &Schema) -> SinkResult<u64>;
}

// =============================================================================
// Table Names
// =============================================================================

static NAME_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \-/.]+").expect("Invalid separator pattern"));

/// Turn an arbitrary name (typically a file stem) into a table name:
/// spaces, dashes, slashes and dots collapse to underscores.
pub fn sanitize_table_name(name: &str) -> String {
    NAME_SEPARATORS.replace_all(name, "_").to_string()
}

// =============================================================================
// Memory Sink
// =============================================================================

/// In-memory sink used by tests and `--dry-run`.
#[derive(Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    tables: HashSet<String>,
    rows: HashMap<String, Vec<Vec<Cell>>>,
    create_count: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a table has been created.
    pub fn table_exists(&self, table: &str) -> bool {
        self.state.lock().unwrap().tables.contains(table)
    }

    /// Rows inserted into a table so far.
    pub fn rows(&self, table: &str) -> Vec<Vec<Cell>> {
        self.state
            .lock()
            .unwrap()
            .rows
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of table creations performed (not ensure calls).
    pub fn create_count(&self) -> usize {
        self.state.lock().unwrap().create_count
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn ensure_table_exists(&self, _schema: &Schema, table: &str) -> SinkResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.tables.insert(table.to_string()) {
            state.create_count += 1;
        }
        Ok(())
    }

    async fn insert(&self, table: &str, rows: &[Vec<Cell>], schema: &Schema) -> SinkResult<u64> {
        self.ensure_table_exists(schema, table).await?;
        let mut state = self.state.lock().unwrap();
        state
            .rows
            .entry(table.to_string())
            .or_default()
            .extend(rows.iter().cloned());
        Ok(rows.len() as u64)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_table_name() {
        assert_eq!(sanitize_table_name("user accounts"), "user_accounts");
        assert_eq!(sanitize_table_name("2024-q1.export"), "2024_q1_export");
        assert_eq!(sanitize_table_name("data/in - out"), "data_in_out");
        assert_eq!(sanitize_table_name("users"), "users");
    }

    #[tokio::test]
    async fn test_ensure_table_is_idempotent() {
        let sink = MemorySink::new();
        let schema = Schema::example();

        sink.ensure_table_exists(&schema, "users").await.unwrap();
        sink.ensure_table_exists(&schema, "users").await.unwrap();

        assert!(sink.table_exists("users"));
        assert_eq!(sink.create_count(), 1);
    }

    #[tokio::test]
    async fn test_insert_creates_table_and_appends() {
        let sink = MemorySink::new();
        let schema = Schema::example();

        let rows = vec![vec![Cell::Int(1), Cell::Str("alice".into())]];
        let written = sink.insert("users", &rows, &schema).await.unwrap();

        assert_eq!(written, 1);
        assert!(sink.table_exists("users"));
        assert_eq!(sink.rows("users").len(), 1);

        sink.insert("users", &rows, &schema).await.unwrap();
        assert_eq!(sink.rows("users").len(), 2);
        assert_eq!(sink.create_count(), 1);
    }
}
