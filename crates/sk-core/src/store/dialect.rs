//! SQL rendering per backend dialect

use super::client::{SqlValue, Statement};
use serde::{Deserialize, Serialize};

pub const COL_SID: &str = "sid";
pub const COL_USER_ID: &str = "user_id";
pub const COL_USER_IP: &str = "user_ip";
pub const COL_STARTED: &str = "session_start";
pub const COL_ENDS: &str = "session_end";
pub const COL_LAST_SEEN: &str = "session_last";
pub const COL_PAYLOAD: &str = "session_data";

/// SQL dialect of the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Mysql,
    Postgres,
}

impl Dialect {
    /// Quote an identifier
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Dialect::Mysql => format!("`{}`", ident.replace('`', "``")),
            Dialect::Sqlite | Dialect::Postgres => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Positional placeholder, 1-based
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::Sqlite | Dialect::Mysql => "?".to_string(),
        }
    }

    /// CREATE TABLE statement for the session table
    pub fn create_table(&self, table: &str) -> Statement {
        let t = self.quote(table);
        let sql = match self {
            Dialect::Sqlite => format!(
                "CREATE TABLE {t} (\
                 sid TEXT NOT NULL PRIMARY KEY, \
                 user_id TEXT NOT NULL DEFAULT '', \
                 user_ip INTEGER NOT NULL DEFAULT 0, \
                 session_start INTEGER NOT NULL DEFAULT 0, \
                 session_end INTEGER NOT NULL DEFAULT 0, \
                 session_last INTEGER NOT NULL DEFAULT 0, \
                 session_data BLOB NOT NULL)"
            ),
            Dialect::Mysql => format!(
                "CREATE TABLE {t} (\
                 `sid` varchar(100) NOT NULL default '', \
                 `user_id` varchar(40) NOT NULL default '', \
                 `user_ip` int(10) unsigned NOT NULL default '0', \
                 `session_start` bigint NOT NULL default '0', \
                 `session_end` bigint NOT NULL default '0', \
                 `session_last` bigint NOT NULL default '0', \
                 `session_data` longblob NOT NULL, \
                 PRIMARY KEY (`sid`)) ENGINE=InnoDB"
            ),
            Dialect::Postgres => format!(
                "CREATE TABLE {t} (\
                 sid varchar(100) NOT NULL PRIMARY KEY, \
                 user_id varchar(40) DEFAULT '' NOT NULL, \
                 user_ip bigint DEFAULT 0 NOT NULL, \
                 session_start bigint DEFAULT 0 NOT NULL, \
                 session_end bigint DEFAULT 0 NOT NULL, \
                 session_last bigint DEFAULT 0 NOT NULL, \
                 session_data bytea NOT NULL)"
            ),
        };
        Statement::new(sql)
    }

    /// INSERT of the given fields
    pub fn insert(&self, table: &str, fields: &[(&str, SqlValue)]) -> Statement {
        let columns: Vec<String> = fields.iter().map(|(c, _)| self.quote(c)).collect();
        let values: Vec<String> = (1..=fields.len()).map(|i| self.placeholder(i)).collect();
        Statement {
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.quote(table),
                columns.join(", "),
                values.join(", ")
            ),
            params: fields.iter().map(|(_, v)| v.clone()).collect(),
        }
    }

    /// UPDATE of `fields` on rows matching every key
    pub fn update(
        &self,
        table: &str,
        fields: &[(&str, SqlValue)],
        keys: &[(&str, SqlValue)],
    ) -> Statement {
        let mut index = 0;
        let mut next = || {
            index += 1;
            self.placeholder(index)
        };
        let assignments: Vec<String> = fields
            .iter()
            .map(|(c, _)| format!("{} = {}", self.quote(c), next()))
            .collect();
        let conditions: Vec<String> = keys
            .iter()
            .map(|(c, _)| format!("{} = {}", self.quote(c), next()))
            .collect();
        Statement {
            sql: format!(
                "UPDATE {} SET {} WHERE {}",
                self.quote(table),
                assignments.join(", "),
                conditions.join(" AND ")
            ),
            params: fields
                .iter()
                .chain(keys.iter())
                .map(|(_, v)| v.clone())
                .collect(),
        }
    }

    /// Point lookup by session id
    pub fn select_by_sid(&self, table: &str, sid: &str) -> Statement {
        Statement::new(format!(
            "SELECT {}, {}, {}, {}, {}, {}, {} FROM {} WHERE {} = {}",
            COL_SID,
            COL_USER_ID,
            COL_USER_IP,
            COL_STARTED,
            COL_ENDS,
            COL_LAST_SEEN,
            COL_PAYLOAD,
            self.quote(table),
            COL_SID,
            self.placeholder(1)
        ))
        .bind(sid)
    }

    /// Row count for a session id
    pub fn count_by_sid(&self, table: &str, sid: &str) -> Statement {
        Statement::new(format!(
            "SELECT COUNT({}) AS n FROM {} WHERE {} = {}",
            COL_SID,
            self.quote(table),
            COL_SID,
            self.placeholder(1)
        ))
        .bind(sid)
    }

    /// Delete rows whose end time is before `now`
    pub fn delete_expired(&self, table: &str, now: i64) -> Statement {
        Statement::new(format!(
            "DELETE FROM {} WHERE {} < {}",
            self.quote(table),
            COL_ENDS,
            self.placeholder(1)
        ))
        .bind(now)
    }
}
