/// Test Utilities Module
///
/// Shared testing infrastructure for tabql: configuration fixtures, a
/// ready-made embedded session, and a scripted [`MockDriver`] that
/// records every statement and escape call without touching a real
/// engine. The mock lets tests pin exact generated SQL text and the
/// poisoning behavior; the embedded fixtures cover the end-to-end
/// paths.
use std::cell::RefCell;
use std::collections::VecDeque;

use crate::config::DbConfig;
use crate::driver::{Driver, DriverError, ExecResult, RowSet, SqliteDriver};
use crate::session::Session;
use crate::sql::StatementKind;

/// MySQL-style literal escaping, as a server-side driver would apply.
///
/// Backslash-escapes quotes, backslashes and the control characters
/// that could terminate or corrupt a quoted literal.
pub fn mysql_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            '\x1a' => out.push_str("\\Z"),
            _ => out.push(c),
        }
    }
    out
}

/// Config pointing the embedded driver at an in-memory database.
pub fn memory_config() -> DbConfig {
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

/// Config used with the mock driver; carries a table prefix so scope
/// handling stays visible in generated SQL.
pub fn mock_config() -> DbConfig {
    DbConfig {
        hostname: "localhost".to_string(),
        port: 3306,
        database: "app".to_string(),
        username: "app".to_string(),
        password: "secret".to_string(),
        prefix: "app_".to_string(),
        table: None,
    }
}

/// Opens an embedded in-memory session with a `posts` table (id, name,
/// status, timestamp) and scopes it as the current table.
pub fn sample_session() -> Session<SqliteDriver> {
    let mut session = Session::<SqliteDriver>::open(&memory_config()).expect("open sample session");
    session
        .run(
            "CREATE TABLE posts (id INTEGER PRIMARY KEY AUTOINCREMENT, \
             name TEXT, status INTEGER, timestamp TEXT DEFAULT CURRENT_TIMESTAMP)",
        )
        .expect("create sample schema");
    session.set_table("posts");
    session
}

/// One scripted response for the mock driver.
#[derive(Debug, Clone)]
enum ScriptedStep {
    Rows(RowSet),
    Affected(u64),
    Error(String),
}

/// Driver double with scripted responses.
///
/// Every executed statement is recorded in order. Responses are
/// consumed front-to-back; once the script is exhausted, row-producing
/// statements (SELECT/SHOW) yield an empty row set and everything else
/// reports one affected row, so happy-path tests need no scripting.
#[derive(Debug, Default)]
pub struct MockDriver {
    pub executed: Vec<String>,
    pub insert_id: i64,
    pub encoding: Option<String>,
    pub closed: bool,
    responses: VecDeque<ScriptedStep>,
    escaped: RefCell<Vec<String>>,
}

impl MockDriver {
    pub fn new() -> Self {
        MockDriver {
            insert_id: 1,
            ..MockDriver::default()
        }
    }

    /// Scripts a row-producing response.
    pub fn push_rows(&mut self, rows: RowSet) {
        self.responses.push_back(ScriptedStep::Rows(rows));
    }

    /// Scripts an affected-count response.
    pub fn push_affected(&mut self, count: u64) {
        self.responses.push_back(ScriptedStep::Affected(count));
    }

    /// Scripts an execution failure.
    pub fn push_error(&mut self, message: &str) {
        self.responses
            .push_back(ScriptedStep::Error(message.to_string()));
    }

    /// Values routed through `escape_literal`, in call order.
    pub fn escaped(&self) -> Vec<String> {
        self.escaped.borrow().clone()
    }
}

impl Driver for MockDriver {
    fn connect(config: &DbConfig) -> Result<Self, DriverError> {
        if config.hostname == "unreachable" {
            return Err(DriverError::Connect("connection refused".to_string()));
        }
        Ok(MockDriver::new())
    }

    fn set_encoding(&mut self, encoding: &str) -> Result<(), DriverError> {
        self.encoding = Some(encoding.to_string());
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<ExecResult, DriverError> {
        self.executed.push(sql.to_string());
        match self.responses.pop_front() {
            Some(ScriptedStep::Rows(rows)) => Ok(ExecResult::Rows(rows)),
            Some(ScriptedStep::Affected(count)) => Ok(ExecResult::Affected(count)),
            Some(ScriptedStep::Error(message)) => Err(DriverError::Execution(message)),
            None => match StatementKind::from_sql(sql) {
                StatementKind::Select | StatementKind::Show => {
                    Ok(ExecResult::Rows(RowSet::default()))
                }
                _ => Ok(ExecResult::Affected(1)),
            },
        }
    }

    fn escape_literal(&self, value: &str) -> String {
        self.escaped.borrow_mut().push(value.to_string());
        mysql_escape(value)
    }

    fn last_insert_id(&self) -> i64 {
        self.insert_id
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mysql_escape_quotes_and_backslashes() {
        assert_eq!(mysql_escape("tes't"), "tes\\'t");
        assert_eq!(mysql_escape("a\\b"), "a\\\\b");
        assert_eq!(mysql_escape("he said \"hi\""), "he said \\\"hi\\\"");
        assert_eq!(mysql_escape("line\nbreak"), "line\\nbreak");
        assert_eq!(mysql_escape("plain"), "plain");
    }

    #[test]
    fn test_mock_scripted_then_default_responses() {
        let mut mock = MockDriver::new();
        mock.push_error("boom");
        assert!(mock.execute("DELETE FROM t WHERE 1").is_err());

        // Script exhausted: SELECT defaults to empty rows, mutations to
        // one affected row.
        match mock.execute("SELECT * FROM t WHERE 1").unwrap() {
            ExecResult::Rows(set) => assert!(set.is_empty()),
            other => panic!("Expected rows, got {:?}", other),
        }
        match mock.execute("DELETE FROM t WHERE 1").unwrap() {
            ExecResult::Affected(n) => assert_eq!(n, 1),
            other => panic!("Expected affected count, got {:?}", other),
        }
        assert_eq!(mock.executed.len(), 3);
    }

    #[test]
    fn test_mock_connect_failure() {
        let mut config = mock_config();
        config.hostname = "unreachable".to_string();
        assert!(MockDriver::connect(&config).is_err());
    }

    #[test]
    fn test_sample_session_has_scoped_table() {
        let mut session = sample_session();
        assert_eq!(session.current_table(), "posts");
        assert!(session.insert(&[("name", "a"), ("status", "2")], None).is_some());
    }
}
