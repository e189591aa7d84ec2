/// SQL Composition Module
///
/// Pure string-building helpers for the statements the session emits.
/// Each helper produces one clause fragment; the session concatenates
/// fragments around the escaped table scope and submits the final text.
///
/// Fragments are built structurally (a sequence of pieces joined with a
/// fixed separator), so clause boundaries never depend on iteration
/// position. Inputs are expected to be escaped already; these functions
/// do not touch a connection.
use serde::Serialize;

/// Default lower bound for date-range filters.
pub const RANGE_START_FLOOR: &str = "0000-00-00";

/// Builds the SET clause body for an UPDATE from `(column, value)` pairs.
///
/// Produces ` col='val', col2='val2'` with a leading space and no
/// trailing separator, ready to append after `UPDATE `t` SET`.
pub fn set_clause(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(column, value)| format!(" {}='{}'", column, value))
        .collect::<Vec<_>>()
        .join(",")
}

/// Builds the WHERE body shared by filtered operations.
///
/// The optional caller-supplied `clause` is followed by the date-range
/// fragment. When `until` is absent the range degenerates to the
/// tautology `1`, so the statement stays valid with neither part
/// present. With `until` set, the fragment constrains the `timestamp`
/// column: `DATE(timestamp) between '<since>' and '<until>'`.
pub fn filter_clause(clause: Option<&str>, since: &str, until: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(condition) = clause {
        out.push(' ');
        out.push_str(condition);
        out.push_str(" AND");
    }
    match until {
        Some(end) => {
            out.push_str(" DATE(timestamp) between '");
            out.push_str(since);
            out.push_str("' and '");
            out.push_str(end);
            out.push('\'');
        }
        None => out.push_str(" 1"),
    }
    out
}

/// Appends GROUP BY, ORDER BY and LIMIT clauses in that fixed order.
///
/// Absent modifiers contribute nothing; present ones are appended as
/// ` GROUP BY g ORDER BY o LIMIT n`.
pub fn query_tail(group: Option<&str>, order: Option<&str>, limit: Option<u64>) -> String {
    let mut out = String::new();
    if let Some(g) = group {
        out.push_str(" GROUP BY ");
        out.push_str(g);
    }
    if let Some(o) = order {
        out.push_str(" ORDER BY ");
        out.push_str(o);
    }
    if let Some(n) = limit {
        out.push_str(" LIMIT ");
        out.push_str(&n.to_string());
    }
    out
}

/// Statement categories recorded alongside each audit-log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StatementKind {
    /// SELECT statement
    Select,
    /// INSERT statement
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
    /// TRUNCATE TABLE statement
    Truncate,
    /// Catalog statements (SHOW TABLES, SHOW TABLE STATUS)
    Show,
    /// Other statement types
    Other,
}

impl StatementKind {
    /// Determines the statement kind from a SQL string
    pub fn from_sql(sql: &str) -> Self {
        let sql_upper = sql.trim().to_uppercase();

        if sql_upper.starts_with("SELECT") {
            StatementKind::Select
        } else if sql_upper.starts_with("INSERT") {
            StatementKind::Insert
        } else if sql_upper.starts_with("UPDATE") {
            StatementKind::Update
        } else if sql_upper.starts_with("DELETE") {
            StatementKind::Delete
        } else if sql_upper.starts_with("TRUNCATE") {
            StatementKind::Truncate
        } else if sql_upper.starts_with("SHOW") {
            StatementKind::Show
        } else {
            StatementKind::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_clause_single_column_has_no_trailing_comma() {
        let pairs = vec![("status".to_string(), "3".to_string())];
        assert_eq!(set_clause(&pairs), " status='3'");
    }

    #[test]
    fn test_set_clause_joins_with_fixed_separator() {
        let pairs = vec![
            ("name".to_string(), "a".to_string()),
            ("status".to_string(), "2".to_string()),
        ];
        assert_eq!(set_clause(&pairs), " name='a', status='2'");
    }

    #[test]
    fn test_filter_clause_degenerates_to_tautology() {
        assert_eq!(filter_clause(None, RANGE_START_FLOOR, None), " 1");
    }

    #[test]
    fn test_filter_clause_where_only() {
        assert_eq!(
            filter_clause(Some("id=1"), RANGE_START_FLOOR, None),
            " id=1 AND 1"
        );
    }

    #[test]
    fn test_filter_clause_with_date_range() {
        assert_eq!(
            filter_clause(Some("status=2"), "2020-01-01", Some("2020-06-20")),
            " status=2 AND DATE(timestamp) between '2020-01-01' and '2020-06-20'"
        );
    }

    #[test]
    fn test_filter_clause_range_without_where() {
        assert_eq!(
            filter_clause(None, RANGE_START_FLOOR, Some("2020-06-20")),
            " DATE(timestamp) between '0000-00-00' and '2020-06-20'"
        );
    }

    #[test]
    fn test_query_tail_fixed_clause_order() {
        assert_eq!(
            query_tail(Some("post_date"), Some("id"), Some(3)),
            " GROUP BY post_date ORDER BY id LIMIT 3"
        );
        assert_eq!(query_tail(None, Some("id"), None), " ORDER BY id");
        assert_eq!(query_tail(None, None, None), "");
    }

    #[test]
    fn test_statement_kind_classification() {
        assert_eq!(
            StatementKind::from_sql("SELECT * FROM users"),
            StatementKind::Select
        );
        assert_eq!(
            StatementKind::from_sql("INSERT INTO `users` (name) VALUES ('a')"),
            StatementKind::Insert
        );
        assert_eq!(
            StatementKind::from_sql("UPDATE `users` SET name='b'"),
            StatementKind::Update
        );
        assert_eq!(
            StatementKind::from_sql("DELETE FROM users WHERE id=1"),
            StatementKind::Delete
        );
        assert_eq!(
            StatementKind::from_sql("TRUNCATE TABLE users"),
            StatementKind::Truncate
        );
        assert_eq!(
            StatementKind::from_sql("show tables like 'users'"),
            StatementKind::Show
        );
        assert_eq!(
            StatementKind::from_sql("PRAGMA encoding"),
            StatementKind::Other
        );
    }
}
