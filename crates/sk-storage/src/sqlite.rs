//! SQLite implementation of the storage client

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use sk_core::error::{Result, SessionError};
use sk_core::store::{Dialect, Row, SqlValue, Statement, StorageClient};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, trace};

/// Storage client over a single SQLite connection.
///
/// The connection sits behind a mutex, so statements from concurrent
/// managers are serialized; other processes are waited on through SQLite's
/// busy timeout.
pub struct SqliteClient {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteClient {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                debug!("Created database directory: {:?}", parent);
            }
        }
        let conn = Connection::open(path).map_err(unavailable)?;
        debug!("Opened session database {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(unavailable)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Wait up to `timeout` for locks held by other connections
    pub fn with_busy_timeout(self, timeout: Duration) -> Result<Self> {
        self.lock()?.busy_timeout(timeout).map_err(unavailable)?;
        Ok(self)
    }

    /// Database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SessionError::StorageUnavailable("connection lock poisoned".into()))
    }
}

impl StorageClient for SqliteClient {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
            .map_err(unavailable)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(unavailable)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(unavailable)?;
        Ok(names)
    }

    fn query(&self, statement: &Statement) -> Result<u64> {
        trace!(sql = %statement.sql, "execute");
        let conn = self.lock()?;
        let affected = conn
            .execute(&statement.sql, params_from_iter(bind(statement)))
            .map_err(unavailable)?;
        Ok(affected as u64)
    }

    fn fetch_row(&self, statement: &Statement) -> Result<Option<Row>> {
        trace!(sql = %statement.sql, "fetch");
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&statement.sql).map_err(unavailable)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt
            .query(params_from_iter(bind(statement)))
            .map_err(unavailable)?;
        let Some(row) = rows.next().map_err(unavailable)? else {
            return Ok(None);
        };

        let mut out = Row::new();
        for (idx, name) in columns.into_iter().enumerate() {
            let value: Value = row.get(idx).map_err(unavailable)?;
            out.insert(name, from_sqlite(value));
        }
        Ok(Some(out))
    }
}

fn unavailable(e: rusqlite::Error) -> SessionError {
    SessionError::StorageUnavailable(e.to_string())
}

fn bind(statement: &Statement) -> Vec<Value> {
    statement
        .params
        .iter()
        .map(|param| match param {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(v) => Value::Integer(*v),
            SqlValue::Text(s) => Value::Text(s.clone()),
            SqlValue::Blob(b) => Value::Blob(b.clone()),
        })
        .collect()
}

fn from_sqlite(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(v),
        Value::Real(v) => SqlValue::Text(v.to_string()),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sk_core::store::SchemaProvisioner;
    use tempfile::TempDir;

    #[test]
    fn test_list_tables_after_provisioning() {
        let client = SqliteClient::in_memory().unwrap();
        assert!(client.list_tables().unwrap().is_empty());

        assert!(SchemaProvisioner::ensure_table(&client, "sessions").unwrap());
        assert!(!SchemaProvisioner::ensure_table(&client, "sessions").unwrap());
        assert_eq!(client.list_tables().unwrap(), vec!["sessions".to_string()]);
    }

    #[test]
    fn test_values_round_trip_through_columns() {
        let client = SqliteClient::in_memory().unwrap();
        client
            .query(&Statement::new(
                "CREATE TABLE t (a INTEGER, b TEXT, c BLOB, d REAL)",
            ))
            .unwrap();
        let inserted = client
            .query(
                &Statement::new("INSERT INTO t (a, b, c, d) VALUES (?, ?, ?, 1.5)")
                    .bind(7i64)
                    .bind("x")
                    .bind(vec![0u8, 1, 2]),
            )
            .unwrap();
        assert_eq!(inserted, 1);

        let row = client
            .fetch_row(&Statement::new("SELECT a, b, c, d FROM t"))
            .unwrap()
            .unwrap();
        assert_eq!(row.get_i64("a"), Some(7));
        assert_eq!(row.get_text("b").as_deref(), Some("x"));
        assert_eq!(row.get_bytes("c"), Some(vec![0, 1, 2]));
        assert_eq!(row.get_text("d").as_deref(), Some("1.5"));
    }

    #[test]
    fn test_fetch_without_rows() {
        let client = SqliteClient::in_memory().unwrap();
        client.query(&Statement::new("CREATE TABLE t (a INTEGER)")).unwrap();
        assert!(client
            .fetch_row(&Statement::new("SELECT a FROM t"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_bad_sql_is_storage_unavailable() {
        let client = SqliteClient::in_memory().unwrap();
        let err = client.query(&Statement::new("SELEKT")).unwrap_err();
        assert!(matches!(err, SessionError::StorageUnavailable(_)));
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("sessions.db");
        let client = SqliteClient::open(&path)
            .unwrap()
            .with_busy_timeout(Duration::from_millis(500))
            .unwrap();
        assert_eq!(client.path(), Some(path.as_path()));
        assert!(path.exists());
    }
}
