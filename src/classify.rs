//! Statement classification by leading keyword.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SqliteError};

static INSERT_TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^\s*INSERT\s+(?:OR\s+[a-z]+\s+)?INTO\s+([a-z_][a-z0-9_]*)\s*(?:\(|VALUES\b|SELECT\b|DEFAULT\s+VALUES\b)",
    )
    .unwrap()
});
static UPSERT_UPDATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\bON\s+CONFLICT\b.*\bDO\s+UPDATE\b").unwrap());

/// DML category of a translated statement.
///
/// Anything that is not INSERT, UPDATE or DELETE is a `Read`, including
/// DDL and pragmas, which run through the row-producing path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
    Read,
}

impl StatementKind {
    pub fn classify(sql: &str) -> Self {
        let keyword = sql
            .trim_start()
            .split(|c: char| !c.is_ascii_alphabetic())
            .next()
            .unwrap_or_default();

        if keyword.eq_ignore_ascii_case("INSERT") {
            StatementKind::Insert
        } else if keyword.eq_ignore_ascii_case("UPDATE") {
            StatementKind::Update
        } else if keyword.eq_ignore_ascii_case("DELETE") {
            StatementKind::Delete
        } else {
            StatementKind::Read
        }
    }
}

/// Target table of a single-table INSERT.
///
/// Only bare, unquoted identifiers are accepted. Schema-qualified or quoted
/// names fail with [`SqliteError::UnsupportedStatement`] instead of being guessed.
pub fn insert_table_name(sql: &str) -> Result<String> {
    INSERT_TABLE_RE
        .captures(sql)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| SqliteError::UnsupportedStatement {
            sql: sql.to_string(),
            reason: "cannot isolate a single unqualified insert target",
        })
}

/// Table to re-fetch an `INSERT ... RETURNING` row from.
///
/// An upsert that takes its `DO UPDATE` branch does not assign a new rowid,
/// so the row to return cannot be located. Such statements are rejected.
pub fn returning_insert_target(sql: &str) -> Result<String> {
    if UPSERT_UPDATE_RE.is_match(sql) {
        return Err(SqliteError::UnsupportedStatement {
            sql: sql.to_string(),
            reason: "RETURNING is not supported on ON CONFLICT ... DO UPDATE",
        });
    }
    insert_table_name(sql)
}
