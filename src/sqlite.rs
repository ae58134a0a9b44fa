use std::fs;
use std::io;

use anyhow::Context;
use indexmap::IndexMap;
use log::{debug, info, warn};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use serde::{Deserialize, Serialize};

use crate::classify::{returning_insert_target, StatementKind};
use crate::config::SqliteConfig;
use crate::error::{Result, SqliteError};
use crate::translate::translate;

/// Core value types for SQLite operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// Bound as integer 0/1. Never produced when reading rows back.
    Boolean(bool),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Boolean(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// JSON request values. Arrays and objects are stored as their JSON text.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map_or(Value::Null, Value::Real),
            },
            serde_json::Value::String(s) => Value::Text(s),
            other @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Value::Text(other.to_string())
            }
        }
    }
}

/// One result record: column name to value, in select order.
pub type Row = IndexMap<String, Value>;

/// Uniform outcome of every statement.
///
/// UPDATE and DELETE carry no rows and report affected rows. Reads report
/// the number of rows returned. INSERT reports affected rows and carries
/// either the inserted row (RETURNING) or a single `{ id }` record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub rows: Vec<Row>,
    pub row_count: usize,
}

impl QueryResult {
    /// First row, if any
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }
}

/// SQL statement with positional parameters (`$1` binds `params[0]`)
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub statement: String,
    pub params: Vec<Value>,
}

impl SqlQuery {
    pub fn new(statement: &str) -> Self {
        Self {
            statement: statement.to_string(),
            params: Vec::new(),
        }
    }
    pub fn with_param(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }
    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }
}

/// Translate, classify and execute `query` on `conn`.
///
/// The caller must hold `conn` exclusively for the duration of the call so
/// that the row identifier read after an insert belongs to that insert.
pub fn run_query(conn: &Connection, query: &SqlQuery) -> Result<QueryResult> {
    let translation = translate(&query.statement);
    let kind = StatementKind::classify(&translation.sql);
    debug!("sqlite {:?}: {}", kind, translation.sql);

    let returning_table = match (kind, &translation.returning) {
        (StatementKind::Insert, Some(_)) => Some(returning_insert_target(&translation.sql)?),
        (_, Some(clause)) => {
            debug!("ignoring RETURNING {} on {:?} statement", clause.columns, kind);
            None
        }
        (_, None) => None,
    };

    execute(
        conn,
        kind,
        &translation.sql,
        &query.params,
        returning_table.as_deref(),
    )
}

/// Execute an already translated statement and normalize its outcome.
///
/// `returning_table` is the insert target when the statement had a
/// RETURNING clause; the inserted row is then fetched back from it by rowid.
pub fn execute(
    conn: &Connection,
    kind: StatementKind,
    sql: &str,
    params: &[Value],
    returning_table: Option<&str>,
) -> Result<QueryResult> {
    match kind {
        StatementKind::Insert => {
            let row_count = conn
                .prepare_cached(sql)?
                .execute(params_from_iter(params.iter()))?;
            let rowid = conn.last_insert_rowid();

            let rows = match returning_table {
                None => vec![Row::from_iter([("id".to_string(), Value::Integer(rowid))])],
                // Nothing was written (e.g. INSERT OR IGNORE): rowid is stale.
                Some(_) if row_count == 0 => Vec::new(),
                Some(table) => fetch_inserted(conn, table, rowid)?,
            };
            Ok(QueryResult { rows, row_count })
        }
        StatementKind::Update | StatementKind::Delete => {
            let row_count = conn
                .prepare_cached(sql)?
                .execute(params_from_iter(params.iter()))?;
            Ok(QueryResult {
                rows: Vec::new(),
                row_count,
            })
        }
        StatementKind::Read => {
            let rows = query_rows(conn, sql, params)?;
            Ok(QueryResult {
                row_count: rows.len(),
                rows,
            })
        }
    }
}

fn fetch_inserted(conn: &Connection, table: &str, rowid: i64) -> Result<Vec<Row>> {
    let sql = format!("SELECT * FROM {table} WHERE rowid = ?1");
    let mut rows = query_rows(conn, &sql, &[Value::Integer(rowid)])?;
    for row in &mut rows {
        row.entry("id".to_string()).or_insert(Value::Integer(rowid));
    }
    Ok(rows)
}

fn query_rows(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare_cached(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut result = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Row::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            record.insert(name.clone(), Value::from(row.get_ref(i)?));
        }
        result.push(record);
    }
    Ok(result)
}

/// Outcome of applying a schema script
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    pub applied: usize,
    /// Statements that failed and were skipped (logged as warnings)
    pub failed: usize,
}

/// Owner of the single SQLite connection.
///
/// Construct one at startup and share it by reference (or `Arc`). The
/// connection is opened on first use; concurrent first callers block on the
/// one initializer and all receive its handle. Every call holds the
/// connection for exactly one statement.
pub struct SqliteService {
    config: SqliteConfig,
    connection: OnceCell<Mutex<Connection>>,
}

impl SqliteService {
    /// Create a new SQLite service with the given config
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            connection: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.connection.get().is_some()
    }

    /// Direct access to the engine connection, opening it on first call.
    ///
    /// Statements issued through the guard bypass translation.
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        let conn = self
            .connection
            .get_or_try_init(|| open_connection(&self.config).map(Mutex::new))?;
        Ok(conn.lock())
    }

    /// Run a Postgres-style statement, e.g.
    /// `query("UPDATE videos SET title = $1 WHERE id = $2", &["Renamed".into(), 1.into()])`.
    pub fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let conn = self.connection()?;
        run_query(
            &conn,
            &SqlQuery::new(sql).with_params(params.to_vec()),
        )
    }

    pub fn execute(&self, query: &SqlQuery) -> Result<QueryResult> {
        let conn = self.connection()?;
        run_query(&conn, query)
    }

    /// Apply the configured schema script.
    ///
    /// A missing script (or none configured) is skipped. Failing statements
    /// are logged and skipped, so re-running against an initialized database
    /// succeeds. Only failing to read the script or to open the database is
    /// an error.
    pub fn bootstrap(&self) -> anyhow::Result<()> {
        let Some(path) = self.config.schema_path.as_deref() else {
            info!("no schema script configured, skipping bootstrap");
            return Ok(());
        };

        let script = match fs::read_to_string(path) {
            Ok(script) => script,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("schema script {} not found, skipping bootstrap", path.display());
                return Ok(());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("reading schema script {}", path.display()))
            }
        };

        let report = self
            .bootstrap_schema(&script)
            .with_context(|| format!("applying schema script {}", path.display()))?;
        info!(
            "schema bootstrap from {}: {} applied, {} skipped",
            path.display(),
            report.applied,
            report.failed
        );
        Ok(())
    }

    /// Split `script` on `;` and execute each non-empty statement in order.
    ///
    /// Statements are translated like queries, so `NOW()` defaults work.
    /// A `;` inside a literal or trigger body splits the statement too.
    pub fn bootstrap_schema(&self, script: &str) -> Result<BootstrapReport> {
        let conn = self.connection()?;
        let mut report = BootstrapReport::default();

        for statement in script.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let sql = translate(statement).sql;
            match conn.execute_batch(&sql) {
                Ok(()) => report.applied += 1,
                Err(source) => {
                    let err = SqliteError::BootstrapStatement {
                        statement: sql,
                        source,
                    };
                    warn!("{err}");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

fn open_connection(config: &SqliteConfig) -> Result<Connection> {
    let conn = if config.is_in_memory() {
        Connection::open_in_memory()?
    } else {
        if let Some(parent) = config
            .db_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
        {
            fs::create_dir_all(parent).map_err(|source| SqliteError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Connection::open(&config.db_path)?
    };

    conn.busy_timeout(config.busy_timeout())?;

    let journal_mode: String = if config.wal {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?
    } else {
        conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?
    };
    if config.wal && !config.is_in_memory() && !journal_mode.eq_ignore_ascii_case("wal") {
        warn!("sqlite refused WAL journaling, using {journal_mode}");
    }

    info!(
        "opened sqlite database at {} (journal_mode={})",
        config.db_path.display(),
        journal_mode
    );
    Ok(conn)
}
