//! Rewrites Postgres-flavoured statement text into SQLite syntax.
//!
//! The rewrite is purely textual. It does not parse SQL and does not skip
//! string literals, so a literal `'$1'` is rewritten like any other `$1`.

use once_cell::sync::Lazy;
use regex::Regex;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$(\d+)").unwrap());
static NOW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bnow\s*\(\s*\)").unwrap());
static RETURNING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)\s+RETURNING\s+([^;']+?)\s*;?\s*$").unwrap());

/// The trailing `RETURNING` clause removed from a statement.
///
/// Only its presence matters to execution: the inserted row is always
/// re-fetched in full, whatever columns were listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturningClause {
    pub columns: String,
}

/// Result of translating one statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Statement text ready for SQLite.
    pub sql: String,
    pub returning: Option<ReturningClause>,
}

impl Translation {
    pub fn is_returning(&self) -> bool {
        self.returning.is_some()
    }
}

/// Translate `sql` into SQLite syntax.
///
/// - `$N` becomes `?N`, SQLite's numbered positional parameter, so the
///   Nth placeholder stays bound to the Nth parameter for any digit width.
/// - `NOW()` becomes `CURRENT_TIMESTAMP`.
/// - A trailing `RETURNING <columns>` is stripped and reported in
///   [`Translation::returning`].
pub fn translate(sql: &str) -> Translation {
    let sql = PLACEHOLDER_RE.replace_all(sql, "?${1}");
    let sql = NOW_RE.replace_all(&sql, "CURRENT_TIMESTAMP");

    let returning = RETURNING_RE.captures(&sql).map(|caps| {
        let start = caps.get(0).map_or(sql.len(), |m| m.start());
        (start, caps[1].trim().to_string())
    });

    match returning {
        Some((start, columns)) => Translation {
            sql: sql[..start].to_string(),
            returning: Some(ReturningClause { columns }),
        },
        None => Translation {
            sql: sql.into_owned(),
            returning: None,
        },
    }
}
