/// Audit Trail Module
///
/// Bookkeeping for everything a session submits to its driver. Every
/// statement is appended to an ordered log; failures and diagnostic
/// notes are keyed by the index of the statement they belong to, so
/// `statements[i]`, `errors[i]` and `notes[i]` always describe the same
/// submission.
///
/// The error map is never cleared. A non-empty error map marks the
/// session as poisoned: the execution choke point checks `poisoned()`
/// and reports failure for every subsequent statement regardless of its
/// own outcome.
use std::collections::BTreeMap;

use serde::Serialize;

use crate::sql::StatementKind;

/// Outcome recorded for one statement in the combined log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StatementStatus {
    /// The statement executed without a recorded error
    Ok,
    /// The recorded error message
    Error(String),
}

/// One entry of the combined audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub sql: String,
    pub kind: StatementKind,
    pub status: StatementStatus,
}

/// Per-session statement, error and note logs.
#[derive(Debug, Default)]
pub struct AuditLog {
    statements: Vec<String>,
    errors: BTreeMap<usize, String>,
    notes: BTreeMap<usize, Vec<String>>,
}

impl AuditLog {
    pub fn new() -> Self {
        AuditLog::default()
    }

    /// Index the next submitted statement will occupy. Notes written
    /// before submission attach here.
    pub fn cursor(&self) -> usize {
        self.statements.len()
    }

    /// Appends a statement and returns the index it was assigned.
    pub fn push_statement(&mut self, sql: &str) -> usize {
        self.statements.push(sql.to_string());
        self.statements.len() - 1
    }

    /// Records an execution failure against a statement index.
    pub fn record_error(&mut self, index: usize, message: String) {
        self.errors.insert(index, message);
    }

    /// Appends a diagnostic note at the current cursor.
    pub fn note(&mut self, text: String) {
        self.notes.entry(self.cursor()).or_default().push(text);
    }

    /// True once any statement in the session's lifetime has failed.
    pub fn poisoned(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Every SQL string submitted, in execution order.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Recorded errors, keyed by statement index.
    pub fn errors(&self) -> &BTreeMap<usize, String> {
        &self.errors
    }

    /// Diagnostic notes, keyed by statement index.
    pub fn notes(&self) -> &BTreeMap<usize, Vec<String>> {
        &self.notes
    }

    /// The combined trail: for every statement its SQL text, kind and
    /// recorded outcome.
    pub fn combined(&self) -> Vec<LogEntry> {
        self.statements
            .iter()
            .enumerate()
            .map(|(i, sql)| LogEntry {
                sql: sql.clone(),
                kind: StatementKind::from_sql(sql),
                status: match self.errors.get(&i) {
                    Some(message) => StatementStatus::Error(message.clone()),
                    None => StatementStatus::Ok,
                },
            })
            .collect()
    }

    /// Serializes the combined trail as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.combined())
    }
}
