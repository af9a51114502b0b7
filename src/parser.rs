//! Statement classification for telemetry labels.
//!
//! Interceptors label metrics and spans with the statement kind and the
//! primary target table. The execution layer usually supplies the table on
//! the scope; when it does not, the table is derived from the statement text
//! here.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// Kind of a SQL-like statement, derived from its leading keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Create,
    Drop,
    Alter,
    Begin,
    Commit,
    Rollback,
    Other,
}

impl StatementKind {
    /// Classify a statement by its leading keyword.
    pub fn of(sql: &str) -> Self {
        let head: String = sql.trim_start().chars().take(12).collect::<String>().to_uppercase();
        if head.starts_with("SELECT") || head.starts_with("WITH") {
            Self::Select
        } else if head.starts_with("INSERT") {
            Self::Insert
        } else if head.starts_with("UPDATE") {
            Self::Update
        } else if head.starts_with("DELETE") {
            Self::Delete
        } else if head.starts_with("CREATE") {
            Self::Create
        } else if head.starts_with("DROP") {
            Self::Drop
        } else if head.starts_with("ALTER") {
            Self::Alter
        } else if head.starts_with("BEGIN") || head.starts_with("START") {
            Self::Begin
        } else if head.starts_with("COMMIT") {
            Self::Commit
        } else if head.starts_with("ROLLBACK") {
            Self::Rollback
        } else {
            Self::Other
        }
    }

    /// Uppercase label for spans and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Create => "CREATE",
            Self::Drop => "DROP",
            Self::Alter => "ALTER",
            Self::Begin => "BEGIN",
            Self::Commit => "COMMIT",
            Self::Rollback => "ROLLBACK",
            Self::Other => "QUERY",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// One extraction pattern per statement kind that names a table. Compiled
// once; checked in kind order after classification.
static TABLE_PATTERNS: Lazy<Vec<(StatementKind, Regex)>> = Lazy::new(|| {
    [
        (StatementKind::Select, r#"(?i)\bFROM\s+[`"\[]?(\w+)"#),
        (StatementKind::Insert, r#"(?i)\bINSERT\s+INTO\s+[`"\[]?(\w+)"#),
        (StatementKind::Update, r#"(?i)\bUPDATE\s+[`"\[]?(\w+)"#),
        (StatementKind::Delete, r#"(?i)\bDELETE\s+FROM\s+[`"\[]?(\w+)"#),
        (
            StatementKind::Create,
            r#"(?i)\bCREATE\s+(?:TEMP(?:ORARY)?\s+)?TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?[`"\[]?(\w+)"#,
        ),
        (
            StatementKind::Drop,
            r#"(?i)\bDROP\s+TABLE\s+(?:IF\s+EXISTS\s+)?[`"\[]?(\w+)"#,
        ),
        (StatementKind::Alter, r#"(?i)\bALTER\s+TABLE\s+[`"\[]?(\w+)"#),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).unwrap()))
    .collect()
});

/// Extract the primary target table from a statement, lowercased.
///
/// Returns `None` for statements with no table (transaction control,
/// unrecognized syntax).
pub fn target_table(sql: &str) -> Option<String> {
    let kind = StatementKind::of(sql);
    let regex = TABLE_PATTERNS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, regex)| regex)?;
    regex
        .captures(sql)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Kind and table of a statement, for span naming.
#[derive(Debug)]
pub struct StatementInfo {
    pub kind: StatementKind,
    pub table: Option<String>,
}

impl StatementInfo {
    pub fn parse(sql: &str) -> Self {
        Self {
            kind: StatementKind::of(sql),
            table: target_table(sql),
        }
    }

    /// `"SELECT orders"`, or just `"SELECT"` when no table is known.
    pub fn span_label(&self) -> String {
        match &self.table {
            Some(table) => format!("{} {}", self.kind, table),
            None => self.kind.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_statements() {
        assert_eq!(StatementKind::of("SELECT * FROM orders"), StatementKind::Select);
        assert_eq!(
            StatementKind::of("WITH cte AS (SELECT 1) SELECT * FROM cte"),
            StatementKind::Select
        );
        assert_eq!(
            StatementKind::of("insert into orders (id) values (?)"),
            StatementKind::Insert
        );
        assert_eq!(StatementKind::of("UPDATE orders SET total = ?"), StatementKind::Update);
        assert_eq!(StatementKind::of("DELETE FROM orders"), StatementKind::Delete);
        assert_eq!(StatementKind::of("START TRANSACTION"), StatementKind::Begin);
        assert_eq!(StatementKind::of("ROLLBACK"), StatementKind::Rollback);
        assert_eq!(StatementKind::of("VACUUM"), StatementKind::Other);
    }

    #[test]
    fn extracts_target_table() {
        assert_eq!(
            target_table("SELECT * FROM orders WHERE id = ?"),
            Some("orders".to_string())
        );
        assert_eq!(
            target_table(r#"SELECT * FROM "Orders" WHERE id = ?"#),
            Some("orders".to_string())
        );
        assert_eq!(
            target_table("select o.* from orders o join users u on u.id = o.user_id"),
            Some("orders".to_string())
        );
        assert_eq!(
            target_table("INSERT INTO line_items (sku) VALUES (?)"),
            Some("line_items".to_string())
        );
        assert_eq!(
            target_table("UPDATE inventory SET count = ? WHERE sku = ?"),
            Some("inventory".to_string())
        );
        assert_eq!(
            target_table("DELETE FROM sessions WHERE expired_at < ?"),
            Some("sessions".to_string())
        );
        assert_eq!(
            target_table("CREATE TABLE IF NOT EXISTS audit (id INTEGER)"),
            Some("audit".to_string())
        );
        assert_eq!(target_table("COMMIT"), None);
    }

    #[test]
    fn span_labels() {
        assert_eq!(
            StatementInfo::parse("SELECT * FROM orders").span_label(),
            "SELECT orders"
        );
        assert_eq!(StatementInfo::parse("BEGIN").span_label(), "BEGIN");
    }
}
