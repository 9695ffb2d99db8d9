//! File system fallback for sessions kept without a database

use serde::{Deserialize, Serialize};
use sk_core::config::TmpDirectoryConfig;
use sk_core::error::{Result, SessionError};
use sk_core::session::SessionState;
use sk_core::store::FallbackStore;
use sk_core::types::SessionId;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// On-disk form of one session
#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    ends_at: i64,
    state: SessionState,
}

/// File system based session fallback: one JSON file per session id
pub struct FileSystemFallback {
    save_path: PathBuf,
}

impl FileSystemFallback {
    /// Create a fallback writing into `save_path`
    pub fn new(save_path: impl Into<PathBuf>) -> Result<Self> {
        let fallback = Self {
            save_path: save_path.into(),
        };
        fallback.ensure_dirs()?;
        Ok(fallback)
    }

    /// Create a fallback at the save path derived from `config`
    pub fn from_config(config: &TmpDirectoryConfig, server_name: &str) -> Result<Self> {
        Self::new(resolve_save_path(config, server_name))
    }

    /// Get save directory
    pub fn save_path(&self) -> &Path {
        &self.save_path
    }

    /// Delete every session file whose end time has passed
    pub fn sweep(&self, now: i64) -> Result<u64> {
        let entries = fs::read_dir(&self.save_path).map_err(|e| {
            SessionError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read session directory: {}", e),
            ))
        })?;

        let mut removed = 0;
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Failed to read directory entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();
            if !is_session_file(&path) {
                continue;
            }

            match read_file(&path) {
                Ok(file) if file.ends_at < now => {
                    fs::remove_file(&path)?;
                    removed += 1;
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable session file {:?}: {}", path, e),
            }
        }

        if removed > 0 {
            info!("Swept {} expired session files", removed);
        }
        Ok(removed)
    }

    fn ensure_dirs(&self) -> Result<()> {
        if !self.save_path.exists() {
            fs::create_dir_all(&self.save_path).map_err(|e| {
                SessionError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create session directory: {}", e),
                ))
            })?;
            debug!("Created session directory: {:?}", self.save_path);
        }
        Ok(())
    }

    fn session_path(&self, sid: &SessionId) -> PathBuf {
        self.save_path.join(format!("{}.json", sid))
    }

    fn temp_path(&self, sid: &SessionId) -> PathBuf {
        self.save_path.join(format!(".{}.json.tmp", sid))
    }
}

impl FallbackStore for FileSystemFallback {
    fn load(&self, sid: &SessionId, now: i64) -> Result<Option<SessionState>> {
        let path = self.session_path(sid);
        if !path.exists() {
            return Ok(None);
        }

        let file = read_file(&path)?;
        if file.ends_at < now {
            debug!("Removing expired session file {:?}", path);
            fs::remove_file(&path)?;
            return Ok(None);
        }
        Ok(Some(file.state))
    }

    fn save(&self, sid: &SessionId, state: &SessionState, ends_at: i64) -> Result<()> {
        let temp_path = self.temp_path(sid);
        let final_path = self.session_path(sid);

        let temp_file = fs::File::create(&temp_path).map_err(|e| {
            SessionError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to create temp file: {}", e),
            ))
        })?;
        let mut writer = BufWriter::new(temp_file);
        serde_json::to_writer(
            &mut writer,
            &SessionFile {
                ends_at,
                state: state.clone(),
            },
        )?;
        writer.flush()?;

        fs::rename(&temp_path, &final_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            SessionError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to rename temp file: {}", e),
            ))
        })?;

        debug!("Saved session {} to {:?}", sid, final_path);
        Ok(())
    }
}

/// Directory session files go to.
///
/// Disabled: the per-user data directory. Enabled: `name` (or the system
/// temp directory when empty), then the server name and a `sessions`
/// subdirectory as configured.
pub fn resolve_save_path(config: &TmpDirectoryConfig, server_name: &str) -> PathBuf {
    if !config.enabled {
        return default_save_path();
    }

    let mut path = if config.name.is_empty() {
        std::env::temp_dir()
    } else {
        PathBuf::from(&config.name)
    };
    if config.use_server_name {
        path.push(directory_name(server_name));
    }
    if config.use_session_dir {
        path.push("sessions");
    }
    path
}

/// Default location (data dir, or ~/.session-keeper)
pub fn default_save_path() -> PathBuf {
    crate::config::data_dir().join("sessions")
}

// Server names come from the request; keep them to one path component.
fn directory_name(server_name: &str) -> String {
    let cleaned: String = server_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        "localhost".to_string()
    } else {
        cleaned
    }
}

fn is_session_file(path: &Path) -> bool {
    let is_json = path.extension().map(|e| e == "json").unwrap_or(false);
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);
    is_json && !hidden
}

fn read_file(path: &Path) -> Result<SessionFile> {
    let file = fs::File::open(path)?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| SessionError::PayloadDecode(format!("{:?}: {}", path, e)))
}
