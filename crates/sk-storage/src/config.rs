//! Database configuration

use crate::sqlite::SqliteClient;
use serde::{Deserialize, Serialize};
use sk_core::error::Result;
use std::path::PathBuf;
use std::time::Duration;

/// Where the session database lives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; defaults to `sessions.db` in the data directory
    pub path: Option<PathBuf>,
    /// How long to wait on a locked database, in milliseconds
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    /// Configured path, or the default location
    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| data_dir().join("sessions.db"))
    }

    /// Open a client for the configured database
    pub fn open(&self) -> Result<SqliteClient> {
        SqliteClient::open(self.resolved_path())?
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
    }
}

/// Per-user data directory (~/.session-keeper when none is known)
pub fn data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "session-keeper", "session-keeper")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".session-keeper")
        })
}
