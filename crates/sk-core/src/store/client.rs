//! Relational client abstraction

use super::dialect::Dialect;
use crate::error::Result;
use std::collections::BTreeMap;

/// A bound SQL parameter or column value
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Text(String),
    Blob(Vec<u8>),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Integer(i64::from(v))
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

/// SQL text plus its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// Statement without parameters
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Append a positional parameter
    pub fn bind(mut self, value: impl Into<SqlValue>) -> Self {
        self.params.push(value.into());
        self
    }
}

/// One result row, keyed by column name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: BTreeMap<String, SqlValue>,
}

impl Row {
    /// Create an empty row
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column value
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(column, value);
        self
    }

    /// Set a column value
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.columns.insert(column.into(), value.into());
    }

    /// Raw column value
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns.get(column)
    }

    /// Column as integer; numeric text is parsed
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.columns.get(column)? {
            SqlValue::Integer(v) => Some(*v),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Column as text
    pub fn get_text(&self, column: &str) -> Option<String> {
        match self.columns.get(column)? {
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Integer(v) => Some(v.to_string()),
            SqlValue::Blob(b) => String::from_utf8(b.clone()).ok(),
            SqlValue::Null => None,
        }
    }

    /// Column as raw bytes
    pub fn get_bytes(&self, column: &str) -> Option<Vec<u8>> {
        match self.columns.get(column)? {
            SqlValue::Blob(b) => Some(b.clone()),
            SqlValue::Text(s) => Some(s.clone().into_bytes()),
            _ => None,
        }
    }

    /// Value of the first column, in column-name order
    pub fn first(&self) -> Option<&SqlValue> {
        self.columns.values().next()
    }
}

/// Capability interface of the backing relational store.
///
/// Implementations must be safe to share between threads; concurrent writers
/// to the same row are resolved by the store (last writer wins).
pub trait StorageClient: Send + Sync {
    /// SQL dialect spoken by this client
    fn dialect(&self) -> Dialect;

    /// Names of existing tables
    fn list_tables(&self) -> Result<Vec<String>>;

    /// Execute a statement, returning the number of affected rows
    fn query(&self, statement: &Statement) -> Result<u64>;

    /// Execute a statement and return its first row, if any
    fn fetch_row(&self, statement: &Statement) -> Result<Option<Row>>;

    /// Build an INSERT for the given fields
    fn build_insert(&self, table: &str, fields: &[(&str, SqlValue)]) -> Statement {
        self.dialect().insert(table, fields)
    }

    /// Build an UPDATE of `fields` on rows matching `keys`
    fn build_update(
        &self,
        table: &str,
        fields: &[(&str, SqlValue)],
        keys: &[(&str, SqlValue)],
    ) -> Statement {
        self.dialect().update(table, fields, keys)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_typed_getters() {
        let row = Row::new()
            .with("user_ip", SqlValue::Text(" 2130706433 ".into()))
            .with("session_end", 42i64)
            .with("session_data", b"{}".to_vec())
            .with("user_id", SqlValue::Null);

        assert_eq!(row.get_i64("user_ip"), Some(2130706433));
        assert_eq!(row.get_i64("session_end"), Some(42));
        assert_eq!(row.get_bytes("session_data"), Some(b"{}".to_vec()));
        assert_eq!(row.get_text("session_data"), Some("{}".to_string()));
        assert_eq!(row.get_text("user_id"), None);
        assert_eq!(row.get_i64("missing"), None);
    }

    #[test]
    fn test_statement_binding() {
        let stmt = Statement::new("SELECT 1 WHERE a = ? AND b = ?")
            .bind("x")
            .bind(7u32);
        assert_eq!(stmt.params, vec![SqlValue::Text("x".into()), SqlValue::Integer(7)]);
    }
}
