/// Driver Module
///
/// The session facade composes SQL text; everything touching an actual
/// database engine lives behind the [`Driver`] trait defined here. A
/// driver supplies the connect/execute/escape/insert-id/close
/// capabilities and decides which dialect it accepts — the facade emits
/// the same statement text regardless of driver.
///
/// The crate ships one embedded implementation,
/// [`sqlite::SqliteDriver`], so the facade is usable end-to-end without
/// a server.
pub mod sqlite;

pub use sqlite::SqliteDriver;

use std::collections::HashMap;

use thiserror::Error;

use crate::config::DbConfig;

/// Errors produced by the driver layer.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Connection could not be established
    #[error("Connect failed: {0}")]
    Connect(String),

    /// Statement execution failed
    #[error("Execution failed: {0}")]
    Execution(String),

    /// Errors from the embedded SQLite engine
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// One materialized result row: column name to display-formatted value.
pub type Record = HashMap<String, String>;

/// Rows produced by a statement, column names plus row values in
/// result order.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Materializes every row as a column-name-to-value record, in
    /// result order.
    pub fn records(&self) -> Vec<Record> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// Outcome of executing one statement.
#[derive(Debug, Clone)]
pub enum ExecResult {
    /// A row-producing statement with its result set
    Rows(RowSet),
    /// A mutating statement with its affected-row count
    Affected(u64),
}

/// Capabilities the session requires from a database engine.
///
/// Connecting consumes a [`DbConfig`]; how its fields are interpreted
/// (network endpoint, file path) is the implementation's concern.
pub trait Driver: Sized {
    /// Establishes a connection described by `config`.
    fn connect(config: &DbConfig) -> Result<Self, DriverError>;

    /// Forces the text encoding used for the connection.
    fn set_encoding(&mut self, encoding: &str) -> Result<(), DriverError>;

    /// Executes one SQL statement and returns its rows or affected count.
    fn execute(&mut self, sql: &str) -> Result<ExecResult, DriverError>;

    /// Escapes a literal value for safe embedding in statement text.
    fn escape_literal(&self, value: &str) -> String;

    /// Row identifier generated by the most recent insert.
    fn last_insert_id(&self) -> i64;

    /// Releases the connection. The session drops the driver right
    /// after calling this, so implementations may also rely on `Drop`.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rowset_records_preserve_row_order() {
        let set = RowSet {
            columns: vec!["id".to_string(), "name".to_string()],
            rows: vec![
                vec!["1".to_string(), "a".to_string()],
                vec!["2".to_string(), "b".to_string()],
            ],
        };
        let records = set.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["id"], "1");
        assert_eq!(records[1]["name"], "b");
    }

    #[test]
    fn test_empty_rowset() {
        let set = RowSet::default();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert!(set.records().is_empty());
    }
}
