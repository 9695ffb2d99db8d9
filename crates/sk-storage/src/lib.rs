//! sk-storage - Storage backends for session-keeper
//!
//! This crate provides the SQLite storage client and the file system
//! fallback used when sessions are kept without a database.

pub mod config;
mod fallback;
mod sqlite;

pub use config::{data_dir, DatabaseConfig};
pub use fallback::{default_save_path, resolve_save_path, FileSystemFallback};
pub use sqlite::SqliteClient;
