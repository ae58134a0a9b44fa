use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the compatibility layer.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// The statement cannot be handled by the shim (e.g. no table name
    /// could be isolated for an `INSERT ... RETURNING`).
    #[error("unsupported statement ({reason}): {sql}")]
    UnsupportedStatement { sql: String, reason: &'static str },

    /// Any failure reported by SQLite. The engine message is passed through untouched.
    #[error(transparent)]
    Engine(#[from] rusqlite::Error),

    /// A single schema statement failed during bootstrap. Only ever logged.
    #[error("schema statement failed: {statement}: {source}")]
    BootstrapStatement {
        statement: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to prepare database directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SqliteError>;
