/// Session Module
///
/// The session facade: one live driver connection, the current table
/// scope, and the audit trail, behind a reduced table-scoped CRUD
/// vocabulary instead of raw SQL. Statements are built by escaping
/// inputs and composing string fragments (`crate::sql`), submitted
/// through a single execution choke point, and recorded in the audit
/// log together with any error they produce.
///
/// After construction a session never raises: failed statements return
/// the `None` sentinel and the detail lives in the audit log. Once any
/// statement has failed the session is poisoned — every subsequent
/// operation reports failure regardless of its own outcome, until the
/// session is discarded.
use std::collections::BTreeMap;

use chrono::Local;
use tracing::{debug, error};

use crate::audit::{AuditLog, LogEntry};
use crate::config::DbConfig;
use crate::core::{Result, TabqlError};
use crate::driver::{Driver, ExecResult, Record};
use crate::sql;

/// Shared WHERE/date-range parameters for filtered operations.
///
/// `clause` is a caller-supplied SQL fragment and passes through
/// verbatim; callers escape the values they embed. `until`/`since`
/// bound the `timestamp` column; with `until` absent the filter
/// degenerates to a tautology and `since` defaults to `0000-00-00`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Filter<'a> {
    pub clause: Option<&'a str>,
    pub until: Option<&'a str>,
    pub since: Option<&'a str>,
}

/// Parameters for the general filtered/paginated read.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectOpts<'a> {
    pub table: Option<&'a str>,
    /// Column list, `*` when absent
    pub columns: Option<&'a str>,
    pub filter: Filter<'a>,
    pub limit: Option<u64>,
    pub order: Option<&'a str>,
    pub group: Option<&'a str>,
}

/// Parameters for `increase`/`decrease`.
#[derive(Debug, Clone, Copy)]
pub struct Adjust<'a> {
    pub clause: Option<&'a str>,
    pub count: i64,
    pub table: Option<&'a str>,
}

impl Default for Adjust<'_> {
    fn default() -> Self {
        Adjust {
            clause: None,
            count: 1,
            table: None,
        }
    }
}

/// One database connection plus its scoping and logging state.
pub struct Session<D: Driver> {
    driver: Option<D>,
    database: String,
    table_prefix: String,
    current_table: String,
    session_date: String,
    audit: AuditLog,
}

impl<D: Driver> Session<D> {
    /// Connects and initializes a session from `config`.
    ///
    /// Forces UTF-8 text encoding on the connection and scopes
    /// `config.table` as the current table when given.
    ///
    /// # Errors
    ///
    /// Returns [`TabqlError::Connection`] if the driver cannot
    /// establish or initialize the connection.
    pub fn open(config: &DbConfig) -> Result<Self> {
        let driver = D::connect(config).map_err(|e| TabqlError::Connection(e.to_string()))?;
        Session::with_driver(driver, config)
    }

    /// Initializes a session over an already-connected driver.
    pub fn with_driver(mut driver: D, config: &DbConfig) -> Result<Self> {
        driver
            .set_encoding("utf8")
            .map_err(|e| TabqlError::Connection(e.to_string()))?;

        let mut session = Session {
            driver: Some(driver),
            database: config.database.clone(),
            table_prefix: config.prefix.clone(),
            current_table: String::new(),
            session_date: Local::now().format("%y-%m-%d").to_string(),
            audit: AuditLog::new(),
        };
        debug!("Session opened for database {}", session.database);

        if let Some(table) = &config.table {
            session.set_table(table);
        }
        Ok(session)
    }

    /// Releases the underlying connection. Safe to call repeatedly;
    /// only the first call releases anything.
    pub fn close(&mut self) {
        if let Some(mut driver) = self.driver.take() {
            driver.close();
            debug!("Session closed");
        }
    }

    /// True while the connection has not been released.
    pub fn is_open(&self) -> bool {
        self.driver.is_some()
    }

    /// The prefixed table name CRUD calls target when they omit an
    /// explicit table.
    pub fn current_table(&self) -> &str {
        &self.current_table
    }

    pub fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    /// Date stamp (`%y-%m-%d`) captured when the session was opened.
    pub fn session_date(&self) -> &str {
        &self.session_date
    }

    // ---- Escaping ------------------------------------------------------

    /// Escapes one scalar for embedding in statement text.
    ///
    /// Empty input returns `None` — the "no value" sentinel — never an
    /// escaped empty string. Each escaped scalar is noted in the audit
    /// trail at the index the next statement will occupy.
    pub fn escape(&mut self, input: &str) -> Option<String> {
        if input.is_empty() {
            return None;
        }
        let driver = self.driver.as_ref()?;
        let escaped = driver.escape_literal(input);
        self.audit.note(format!("Escaped {}", input));
        Some(escaped)
    }

    /// Escapes every key and value of a record, preserving entry order.
    pub fn escape_record(&mut self, record: &[(&str, &str)]) -> Vec<(String, String)> {
        record
            .iter()
            .map(|(key, value)| {
                (
                    self.escape(key).unwrap_or_default(),
                    self.escape(value).unwrap_or_default(),
                )
            })
            .collect()
    }

    // ---- Table scoping -------------------------------------------------

    /// Scopes the current table to `prefix + escape(table)`.
    ///
    /// Returns false when the computed name is empty.
    pub fn set_table(&mut self, table: &str) -> bool {
        let escaped = self.escape(table).unwrap_or_default();
        self.current_table = format!("{}{}", self.table_prefix, escaped);
        self.audit.note(format!("Set table: '{}'", table));
        !self.current_table.is_empty()
    }

    fn rescope(&mut self, table: Option<&str>) {
        if let Some(t) = table {
            self.set_table(t);
        }
    }

    /// Checks table existence, optionally re-scoping first.
    pub fn is_table(&mut self, table: Option<&str>) -> bool {
        self.rescope(table);
        let text = format!("show tables like '{}'", self.current_table);
        matches!(self.run_internal(&text), Some(ExecResult::Rows(set)) if !set.is_empty())
    }

    // ---- Statement execution -------------------------------------------

    /// Single choke point every statement passes through.
    ///
    /// Appends the statement to the audit log, submits it, records any
    /// failure, and applies the poisoning gate: a session with any
    /// recorded error reports failure for every statement from then on.
    fn run_internal(&mut self, text: &str) -> Option<ExecResult> {
        let index = self.audit.push_statement(text);
        debug!(statement = index, "Executing: {}", text);

        let result = match self.driver.as_mut() {
            Some(driver) => match driver.execute(text) {
                Ok(result) => Some(result),
                Err(e) => {
                    let message = format!("Error: {}", e);
                    error!("Statement {} failed: {}", index, message);
                    self.audit.record_error(index, message);
                    None
                }
            },
            None => {
                self.audit
                    .record_error(index, "Error: session is closed".to_string());
                None
            }
        };

        if self.audit.poisoned() {
            return None;
        }
        result
    }

    /// Raw statement passthrough for SQL outside the CRUD vocabulary.
    /// Logged and gated like every other statement.
    pub fn run(&mut self, text: &str) -> Option<ExecResult> {
        self.run_internal(text)
    }

    fn affected(&mut self, text: &str) -> Option<u64> {
        match self.run_internal(text)? {
            ExecResult::Affected(n) => Some(n),
            ExecResult::Rows(_) => Some(0),
        }
    }

    /// Builds the shared WHERE body, escaping the date bounds.
    fn filter_fragment(&mut self, filter: Filter) -> String {
        let since = self
            .escape(filter.since.unwrap_or(sql::RANGE_START_FLOOR))
            .unwrap_or_default();
        let until = filter.until.and_then(|end| self.escape(end));
        sql::filter_clause(filter.clause, &since, until.as_deref())
    }

    // ---- Read query composition ----------------------------------------

    /// Executes a read query with optional GROUP BY / ORDER BY / LIMIT
    /// modifiers, appended in that fixed order, and materializes every
    /// result row. Returns `None` when zero rows were produced or the
    /// execution failed.
    pub fn query(
        &mut self,
        text: &str,
        limit: Option<u64>,
        order: Option<&str>,
        group: Option<&str>,
    ) -> Option<Vec<Record>> {
        let order = order.and_then(|o| self.escape(o));
        let group = group.and_then(|g| self.escape(g));

        let mut text = text.to_string();
        text.push_str(&sql::query_tail(group.as_deref(), order.as_deref(), limit));

        match self.run_internal(&text)? {
            ExecResult::Rows(set) if !set.is_empty() => Some(set.records()),
            _ => None,
        }
    }

    // ---- CRUD ----------------------------------------------------------

    /// Inserts one record and returns the generated row id.
    pub fn insert(&mut self, record: &[(&str, &str)], table: Option<&str>) -> Option<i64> {
        self.rescope(table);
        let data = self.escape_record(record);
        let columns = data
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let values = data
            .iter()
            .map(|(_, v)| v.as_str())
            .collect::<Vec<_>>()
            .join("', '");

        let text = format!(
            "INSERT INTO `{}` ({}) VALUES ('{}')",
            self.current_table, columns, values
        );
        self.run_internal(&text)?;
        Some(self.driver.as_ref()?.last_insert_id())
    }

    fn update_sql(&mut self, record: &[(&str, &str)]) -> String {
        let data = self.escape_record(record);
        format!(
            "UPDATE `{}` SET{}",
            self.current_table,
            sql::set_clause(&data)
        )
    }

    /// Updates one row by primary key.
    pub fn update_by_id(
        &mut self,
        id: i64,
        record: &[(&str, &str)],
        table: Option<&str>,
    ) -> Option<u64> {
        self.rescope(table);
        let mut text = self.update_sql(record);
        text.push_str(&format!(" WHERE id={}", id));
        self.affected(&text)
    }

    /// Updates every row matching the filter.
    pub fn update_where(
        &mut self,
        record: &[(&str, &str)],
        filter: Filter,
        table: Option<&str>,
    ) -> Option<u64> {
        self.rescope(table);
        let set_part = self.update_sql(record);
        let filter_part = self.filter_fragment(filter);
        let text = format!("{} WHERE{}", set_part, filter_part);
        self.affected(&text)
    }

    /// Deletes one row by primary key.
    pub fn delete_by_id(&mut self, id: i64, table: Option<&str>) -> Option<u64> {
        self.rescope(table);
        let text = format!("DELETE FROM {} WHERE id={}", self.current_table, id);
        self.affected(&text)
    }

    /// Deletes every row matching the filter.
    pub fn delete_where(&mut self, filter: Filter, table: Option<&str>) -> Option<u64> {
        self.rescope(table);
        let filter_part = self.filter_fragment(filter);
        let text = format!("DELETE FROM {} WHERE{}", self.current_table, filter_part);
        self.affected(&text)
    }

    /// Removes all rows from the table.
    pub fn clear_table(&mut self, table: Option<&str>) -> Option<u64> {
        self.rescope(table);
        let text = format!("TRUNCATE TABLE {}", self.current_table);
        self.affected(&text)
    }

    fn adjust_column(&mut self, column: &str, adjust: Adjust, op: char) -> Option<u64> {
        self.rescope(adjust.table);
        let column = self.escape(column)?;
        let mut text = format!(
            "UPDATE {} SET {}={}{}{}",
            self.current_table, column, column, op, adjust.count
        );
        if let Some(condition) = adjust.clause {
            text.push_str(&format!(" WHERE {}", condition));
        }
        self.affected(&text)
    }

    /// Increments a column, optionally constrained by a WHERE fragment.
    pub fn increase(&mut self, column: &str, adjust: Adjust) -> Option<u64> {
        self.adjust_column(column, adjust, '+')
    }

    /// Decrements a column, optionally constrained by a WHERE fragment.
    pub fn decrease(&mut self, column: &str, adjust: Adjust) -> Option<u64> {
        self.adjust_column(column, adjust, '-')
    }

    // ---- Aggregates ----------------------------------------------------

    /// Number of rows matching the filter; `None` when zero matched.
    pub fn exists(&mut self, filter: Filter, table: Option<&str>) -> Option<usize> {
        self.rescope(table);
        let filter_part = self.filter_fragment(filter);
        let text = format!("SELECT * FROM {} WHERE{}", self.current_table, filter_part);
        let rows = self.query(&text, None, None, None)?;
        Some(rows.len())
    }

    /// `COUNT(*)` over the filtered rows.
    pub fn count(&mut self, filter: Filter, table: Option<&str>) -> Option<i64> {
        self.rescope(table);
        let filter_part = self.filter_fragment(filter);
        let text = format!(
            "SELECT COUNT(*) as count FROM {} WHERE{}",
            self.current_table, filter_part
        );
        let rows = self.query(&text, Some(1), None, None)?;
        rows.first()?.get("count")?.parse().ok()
    }

    /// `SUM(column)` over the filtered rows; `None` when no row
    /// contributed a value.
    pub fn sum(&mut self, column: &str, filter: Filter, table: Option<&str>) -> Option<String> {
        self.rescope(table);
        let column = self.escape(column)?;
        let filter_part = self.filter_fragment(filter);
        let text = format!(
            "SELECT SUM({}) as sum FROM {} WHERE{}",
            column, self.current_table, filter_part
        );
        let rows = self.query(&text, Some(1), None, None)?;
        let value = rows.first()?.get("sum")?.clone();
        if value == "NULL" {
            None
        } else {
            Some(value)
        }
    }

    // ---- Single-value reads --------------------------------------------

    /// Single scalar from one column of the row with the given id.
    pub fn column_value(&mut self, id: i64, column: &str, table: Option<&str>) -> Option<String> {
        self.rescope(table);
        let column = self.escape(column)?;
        let text = format!(
            "SELECT {} FROM {} WHERE id={}",
            column, self.current_table, id
        );
        let rows = self.query(&text, Some(1), None, None)?;
        rows.first()?.values().next().cloned()
    }

    /// The `status` column of the row with the given id.
    pub fn status(&mut self, id: i64, table: Option<&str>) -> Option<String> {
        self.column_value(id, "status", table)
    }

    /// The `timestamp` column of the row with the given id.
    pub fn timestamp(&mut self, id: i64, table: Option<&str>) -> Option<String> {
        self.column_value(id, "timestamp", table)
    }

    // ---- Selects -------------------------------------------------------

    /// General filtered/paginated read.
    pub fn select(&mut self, opts: SelectOpts) -> Option<Vec<Record>> {
        self.rescope(opts.table);
        let columns = self.escape(opts.columns.unwrap_or("*")).unwrap_or_default();
        let filter_part = self.filter_fragment(opts.filter);
        let text = format!(
            "SELECT {} FROM {} WHERE{}",
            columns, self.current_table, filter_part
        );
        self.query(&text, opts.limit, opts.order, opts.group)
    }

    /// First row matching an optional WHERE fragment.
    pub fn select_row(
        &mut self,
        clause: Option<&str>,
        order: Option<&str>,
        table: Option<&str>,
    ) -> Option<Record> {
        self.rescope(table);
        let mut text = format!("SELECT * FROM {}", self.current_table);
        if let Some(condition) = clause {
            text.push_str(&format!(" WHERE {}", condition));
        }
        let rows = self.query(&text, Some(1), order, None)?;
        rows.into_iter().next()
    }

    /// One row by primary key.
    pub fn select_by_id(
        &mut self,
        id: i64,
        columns: Option<&str>,
        table: Option<&str>,
    ) -> Option<Record> {
        self.rescope(table);
        let columns = self.escape(columns.unwrap_or("*")).unwrap_or_default();
        let text = format!(
            "SELECT {} FROM {} WHERE id={}",
            columns, self.current_table, id
        );
        let rows = self.query(&text, Some(1), None, None)?;
        rows.into_iter().next()
    }

    /// Every row of the table, with optional limit and order.
    pub fn select_all(
        &mut self,
        limit: Option<u64>,
        order: Option<&str>,
        table: Option<&str>,
    ) -> Option<Vec<Record>> {
        self.rescope(table);
        let text = format!("SELECT * FROM {}", self.current_table);
        self.query(&text, limit, order, None)
    }

    // ---- Introspection -------------------------------------------------

    /// Catalog status row for the current (or given) table.
    pub fn table_info(&mut self, table: Option<&str>) -> Option<Vec<Record>> {
        self.rescope(table);
        let text = format!(
            "show table status from {} WHERE Name='{}'",
            self.database, self.current_table
        );
        self.query(&text, None, None, None)
    }

    /// Column catalog rows for the current (or given) table.
    pub fn table_columns(&mut self, table: Option<&str>) -> Option<Vec<Record>> {
        self.rescope(table);
        let text = format!(
            "SELECT `COLUMN_NAME` FROM `INFORMATION_SCHEMA`.`COLUMNS` WHERE TABLE_NAME='{}' AND TABLE_SCHEMA='{}'",
            self.current_table, self.database
        );
        self.query(&text, None, None, None)
    }

    /// Server version string, noted in the audit trail.
    pub fn server_version(&mut self) -> Option<String> {
        let rows = self.query("SELECT version() as ver", None, None, None)?;
        let version = rows.first()?.get("ver")?.clone();
        self.audit.note(format!("version: {}", version));
        Some(version)
    }

    // ---- Inspection ----------------------------------------------------

    /// Every SQL string submitted, in execution order.
    pub fn statement_log(&self) -> &[String] {
        self.audit.statements()
    }

    /// Recorded execution errors, keyed by statement index.
    pub fn error_log(&self) -> &BTreeMap<usize, String> {
        self.audit.errors()
    }

    /// Diagnostic notes, keyed by statement index.
    pub fn note_log(&self) -> &BTreeMap<usize, Vec<String>> {
        self.audit.notes()
    }

    /// The combined trail: SQL text, statement kind and outcome per
    /// statement.
    pub fn combined_log(&self) -> Vec<LogEntry> {
        self.audit.combined()
    }

    /// The full audit log, for JSON export and direct inspection.
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }
}

impl<D: Driver> Drop for Session<D> {
    fn drop(&mut self) {
        self.close();
    }
}
