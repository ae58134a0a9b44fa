use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub const IN_MEMORY_PATH: &str = ":memory:";

const DEFAULT_DB_PATH: &str = "data/app.db";
const DEFAULT_SCHEMA_PATH: &str = "schema.sql";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// SQLite service configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Path to the SQLite database file, or `:memory:`
    pub db_path: PathBuf,
    /// Schema script applied by `bootstrap()`. `None` disables bootstrap.
    pub schema_path: Option<PathBuf>,
    /// Put the database in write-ahead-log journaling mode on open
    pub wal: bool,
    pub busy_timeout_ms: u64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            schema_path: Some(PathBuf::from(DEFAULT_SCHEMA_PATH)),
            wal: true,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl SqliteConfig {
    /// Create a config for the given database file with default settings
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }

    /// In-memory database with no schema script.
    pub fn in_memory() -> Self {
        Self {
            db_path: PathBuf::from(IN_MEMORY_PATH),
            schema_path: None,
            ..Self::default()
        }
    }

    pub fn with_schema_path(mut self, schema_path: impl Into<PathBuf>) -> Self {
        self.schema_path = Some(schema_path.into());
        self
    }

    pub fn without_schema(mut self) -> Self {
        self.schema_path = None;
        self
    }

    pub fn with_wal(mut self, wal: bool) -> Self {
        self.wal = wal;
        self
    }

    /// Build a config from `SQLITE_DB_PATH`, `SQLITE_SCHEMA_PATH`,
    /// `SQLITE_WAL` and `SQLITE_BUSY_TIMEOUT_MS`, falling back to defaults.
    ///
    /// An empty `SQLITE_SCHEMA_PATH` disables bootstrap.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(path) = env::var("SQLITE_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Ok(path) = env::var("SQLITE_SCHEMA_PATH") {
            config.schema_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }
        if let Ok(wal) = env::var("SQLITE_WAL") {
            config.wal = !matches!(wal.to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no");
        }
        if let Some(ms) = env::var("SQLITE_BUSY_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.busy_timeout_ms = ms;
        }
        config
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path.as_os_str() == IN_MEMORY_PATH
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_partial_config_with_defaults() {
        let config: SqliteConfig =
            serde_json::from_str(r#"{ "db_path": "/tmp/videos.db", "wal": false }"#).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/videos.db"));
        assert!(!config.wal);
        assert_eq!(config.schema_path, Some(PathBuf::from(DEFAULT_SCHEMA_PATH)));
        assert_eq!(config.busy_timeout(), Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS));
    }

    #[test]
    fn in_memory_has_no_schema() {
        let config = SqliteConfig::in_memory();
        assert!(config.is_in_memory());
        assert!(config.schema_path.is_none());
    }
}
