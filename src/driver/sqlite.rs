/// Embedded SQLite driver.
///
/// Backs the [`Driver`](super::Driver) contract with a rusqlite
/// connection. `DbConfig.database` is interpreted as the database file
/// path (`:memory:` for an in-memory database); the network and
/// credential fields do not apply to an embedded engine and are
/// ignored. Statements outside SQLite's dialect fail at execution and
/// surface as ordinary execution errors.
use rusqlite::{types::ValueRef, Connection};
use tracing::debug;

use super::{Driver, DriverError, ExecResult, RowSet};
use crate::config::DbConfig;

#[derive(Debug)]
pub struct SqliteDriver {
    conn: Connection,
}

impl Driver for SqliteDriver {
    fn connect(config: &DbConfig) -> Result<Self, DriverError> {
        let conn = if config.database == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(&config.database)
        }
        .map_err(|e| DriverError::Connect(e.to_string()))?;

        debug!("Opened SQLite database {}", config.database);
        Ok(SqliteDriver { conn })
    }

    fn set_encoding(&mut self, encoding: &str) -> Result<(), DriverError> {
        // SQLite spells the pragma value "UTF-8"; accept the bare form too.
        let name = if encoding.eq_ignore_ascii_case("utf8") {
            "UTF-8"
        } else {
            encoding
        };
        self.conn
            .execute_batch(&format!("PRAGMA encoding = '{}';", name))?;
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<ExecResult, DriverError> {
        let mut stmt = self.conn.prepare(sql)?;

        if stmt.column_count() > 0 {
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let column_count = stmt.column_count();

            let rows = stmt
                .query_map([], |row| {
                    let mut values = Vec::new();
                    for i in 0..column_count {
                        let value_ref = row.get_ref(i)?;
                        values.push(format_value(value_ref));
                    }
                    Ok(values)
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(ExecResult::Rows(RowSet { columns, rows }))
        } else {
            let affected = stmt.execute([])?;
            Ok(ExecResult::Affected(affected as u64))
        }
    }

    fn escape_literal(&self, value: &str) -> String {
        // SQLite string literals escape a quote by doubling it.
        value.replace('\'', "''")
    }

    fn last_insert_id(&self) -> i64 {
        self.conn.last_insert_rowid()
    }

    fn close(&mut self) {
        // The connection is released when the driver is dropped by the
        // session immediately after this call.
        debug!("Closing SQLite database");
    }
}

/// Formats a SQLite value for display
fn format_value(value: ValueRef) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).to_string(),
        ValueRef::Blob(b) => format!("<BLOB: {} bytes>", b.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> DbConfig {
        DbConfig {
            hostname: "localhost".to_string(),
            port: 0,
            database: ":memory:".to_string(),
            username: String::new(),
            password: String::new(),
            prefix: String::new(),
            table: None,
        }
    }

    fn seeded_driver() -> SqliteDriver {
        let mut driver = SqliteDriver::connect(&memory_config()).unwrap();
        driver
            .execute(
                "CREATE TABLE test (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, status INTEGER)",
            )
            .unwrap();
        driver
    }

    #[test]
    fn test_connect_and_set_encoding() {
        let mut driver = SqliteDriver::connect(&memory_config()).unwrap();
        driver.set_encoding("utf8").unwrap();
    }

    #[test]
    fn test_execute_returns_affected_count() {
        let mut driver = seeded_driver();
        let result = driver
            .execute("INSERT INTO test (name, status) VALUES ('a', 2)")
            .unwrap();
        match result {
            ExecResult::Affected(n) => assert_eq!(n, 1),
            other => panic!("Expected affected count, got {:?}", other),
        }
        assert_eq!(driver.last_insert_id(), 1);
    }

    #[test]
    fn test_execute_returns_rows() {
        let mut driver = seeded_driver();
        driver
            .execute("INSERT INTO test (name, status) VALUES ('a', 2)")
            .unwrap();
        driver
            .execute("INSERT INTO test (name, status) VALUES ('b', 3)")
            .unwrap();

        let result = driver.execute("SELECT * FROM test ORDER BY id").unwrap();
        match result {
            ExecResult::Rows(set) => {
                assert_eq!(set.columns, vec!["id", "name", "status"]);
                assert_eq!(set.len(), 2);
                assert_eq!(set.rows[0], vec!["1", "a", "2"]);
            }
            other => panic!("Expected rows, got {:?}", other),
        }
    }

    #[test]
    fn test_execute_error_for_missing_table() {
        let mut driver = SqliteDriver::connect(&memory_config()).unwrap();
        let result = driver.execute("SELECT * FROM nonexistent");
        assert!(result.is_err());
    }

    #[test]
    fn test_escape_literal_doubles_quotes() {
        let driver = SqliteDriver::connect(&memory_config()).unwrap();
        assert_eq!(driver.escape_literal("tes't"), "tes''t");
        assert_eq!(driver.escape_literal("plain"), "plain");
    }

    #[test]
    fn test_null_formatting() {
        let mut driver = seeded_driver();
        driver
            .execute("INSERT INTO test (name, status) VALUES (NULL, NULL)")
            .unwrap();
        let result = driver.execute("SELECT name FROM test").unwrap();
        match result {
            ExecResult::Rows(set) => assert_eq!(set.rows[0][0], "NULL"),
            other => panic!("Expected rows, got {:?}", other),
        }
    }
}
