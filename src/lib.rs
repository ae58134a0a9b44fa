//! Postgres-style query compatibility layer over an embedded SQLite database.
//!
//! # Intention
//!
//! - Let callers keep writing statements with `$N` placeholders, `NOW()` and
//!   `INSERT ... RETURNING`, and run them unchanged against SQLite.
//! - Return every outcome in one shape: `rows` plus `rowCount`.
//! - Own the single SQLite connection: open it lazily in WAL mode and
//!   bootstrap the schema from an external script.
//!
//! # Architectural Boundaries
//!
//! - Not a SQL parser. Translation and classification are textual.
//! - One statement per call. No joins in RETURNING, no multi-table inserts,
//!   no transactions spanning calls, no connection pooling.
//! - INSERT ... RETURNING only supports single, unqualified, unquoted table
//!   names and always returns the whole inserted row.

pub mod classify;
pub mod config;
pub mod error;
pub mod sqlite;
pub mod translate;

pub use classify::{insert_table_name, returning_insert_target, StatementKind};
pub use config::SqliteConfig;
pub use error::{Result, SqliteError};
pub use sqlite::{run_query, BootstrapReport, QueryResult, Row, SqlQuery, SqliteService, Value};
pub use translate::{translate, ReturningClause, Translation};
