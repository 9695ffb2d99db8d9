//! Configuration management for session-keeper

use crate::error::{Result, SessionError};
use crate::store::Dialect;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Session manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Cookie name carrying the session token
    pub session_name: String,
    /// Lifetime of a guest session, in seconds
    pub guest_ttl: u64,
    /// Lifetime of a remembered session, in seconds
    pub remember_ttl: u64,
    /// Persist session payloads to the database
    pub use_database: bool,
    /// Name of the backing table
    pub table_name: String,
    /// SQL dialect of the backing store
    pub dialect: Dialect,
    /// Record step-by-step diagnostics
    pub debug: bool,
    /// Destination name for collected diagnostics
    pub log_file: String,
    /// Cookie attributes
    pub cookie: CookieConfig,
    /// File-backed fallback storage
    pub tmp_directory: TmpDirectoryConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_name: "cms".to_string(),
            guest_ttl: 3600,
            remember_ttl: 2_592_000,
            use_database: true,
            table_name: "sessions".to_string(),
            dialect: Dialect::default(),
            debug: false,
            log_file: "session.log".to_string(),
            cookie: CookieConfig::default(),
            tmp_directory: TmpDirectoryConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
            .map_err(|e| e.with_context(format!("Failed to load {}", path.as_ref().display())))
    }

    /// Render as pretty TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check option values for consistency
    pub fn validate(&self) -> Result<()> {
        if self.session_name.is_empty() {
            return Err(SessionError::Config("session_name must not be empty".into()));
        }
        if !self.session_name.bytes().all(is_cookie_name_byte) {
            return Err(SessionError::Config(format!(
                "session_name {:?} is not a valid cookie name",
                self.session_name
            )));
        }
        if self.guest_ttl == 0 || self.remember_ttl == 0 {
            return Err(SessionError::Config("TTLs must be positive".into()));
        }
        if self.remember_ttl < self.guest_ttl {
            return Err(SessionError::Config(format!(
                "remember_ttl ({}) is shorter than guest_ttl ({})",
                self.remember_ttl, self.guest_ttl
            )));
        }
        if !is_sql_identifier(&self.table_name) {
            return Err(SessionError::Config(format!(
                "table_name {:?} is not a plain SQL identifier",
                self.table_name
            )));
        }
        Ok(())
    }
}

/// Cookie attribute defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Send the cookie over encrypted transport only
    pub secure: bool,
    /// Hide the cookie from client-side scripts
    pub http_only: bool,
    /// Cross-site sending policy
    pub same_site: SameSitePolicy,
    /// Cookie path
    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secure: true,
            http_only: true,
            same_site: SameSitePolicy::Lax,
            path: "/".to_string(),
        }
    }
}

/// `SameSite` cookie attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    Strict,
    #[default]
    Lax,
    None,
}

impl From<SameSitePolicy> for cookie::SameSite {
    fn from(policy: SameSitePolicy) -> Self {
        match policy {
            SameSitePolicy::Strict => cookie::SameSite::Strict,
            SameSitePolicy::Lax => cookie::SameSite::Lax,
            SameSitePolicy::None => cookie::SameSite::None,
        }
    }
}

/// Save-path policy for the file-backed fallback store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TmpDirectoryConfig {
    /// Persist sessions to files when the database is not used
    pub enabled: bool,
    /// Root directory; empty means the system temp directory
    pub name: String,
    /// Nest sessions under a directory named after the server
    pub use_server_name: bool,
    /// Nest sessions under a `sessions` subdirectory
    pub use_session_dir: bool,
}

impl Default for TmpDirectoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "cookie".to_string(),
            use_server_name: true,
            use_session_dir: false,
        }
    }
}

fn is_cookie_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

fn is_sql_identifier(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(first) if first.is_ascii_alphabetic() || first == b'_' => {
            bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
        }
        _ => false,
    }
}
