//! Error types for session-keeper

use thiserror::Error;

/// Main error type for session-keeper
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session table could not be created
    #[error("Provisioning error: {0}")]
    Provisioning(String),

    /// An inbound session token failed format validation
    #[error("Malformed session identifier: {0}")]
    MalformedIdentifier(String),

    /// Any read or write fault against the backing store
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// `flush()` was called before `init()`
    #[error("Session not started: flush called before init")]
    FlushBeforeInit,

    /// A stored payload could not be deserialized
    #[error("Payload decode error: {0}")]
    PayloadDecode(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation not allowed in the manager's current phase
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SessionError>,
    },
}

impl SessionError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SessionError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether the session manager degrades around this error instead of
    /// failing the request.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SessionError::Provisioning(_)
            | SessionError::MalformedIdentifier(_)
            | SessionError::StorageUnavailable(_)
            | SessionError::FlushBeforeInit
            | SessionError::PayloadDecode(_) => true,
            SessionError::WithContext { source, .. } => source.is_recoverable(),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for SessionError {
    fn from(err: toml::de::Error) -> Self {
        SessionError::Toml(err.to_string())
    }
}

impl From<toml::ser::Error> for SessionError {
    fn from(err: toml::ser::Error) -> Self {
        SessionError::Toml(err.to_string())
    }
}

/// Result type alias for session-keeper
pub type Result<T> = std::result::Result<T, SessionError>;
