//! Core type definitions for session-keeper

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};

/// Length of a session token: a hex-encoded 32-byte BLAKE3 digest
pub const TOKEN_LEN: usize = 64;

/// Opaque bearer token correlating a client with its stored session.
/// Format: exactly 64 lowercase hexadecimal characters.
///
/// Shorter hex tokens, such as the 32-character MD5 cookies issued by older
/// deployments, fail validation. The manager replaces them with a freshly
/// minted token instead of reusing them, so those clients start a new session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Create from a string with validation
    pub fn from_string(s: impl Into<String>) -> crate::Result<Self> {
        let s = s.into();
        if Self::validate(&s) {
            Ok(SessionId(s))
        } else {
            Err(crate::SessionError::MalformedIdentifier(format!(
                "expected {} hex characters, got {:?}",
                TOKEN_LEN, s
            )))
        }
    }

    /// Wrap an already-validated digest
    pub(crate) fn from_digest(hash: blake3::Hash) -> Self {
        SessionId(hash.to_hex().to_string())
    }

    /// Validate token format
    pub fn validate(s: &str) -> bool {
        s.len() == TOKEN_LEN
            && s
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }

    /// Get the string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = crate::SessionError;

    fn try_from(value: String) -> crate::Result<Self> {
        SessionId::from_string(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Network identity of the client behind the current request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkIdentity {
    /// Client IP address as reported by the transport
    pub ip: String,
    /// Resolved proxy address, empty when the request came in directly
    pub proxy: String,
}

impl NetworkIdentity {
    /// Create an identity for a direct connection
    pub fn direct(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            proxy: String::new(),
        }
    }

    /// Create an identity for a proxied connection
    pub fn proxied(ip: impl Into<String>, proxy: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            proxy: proxy.into(),
        }
    }

    /// Unsigned 32-bit encoding of the client IPv4 address.
    /// IPv6 and unparsable addresses encode as 0.
    pub fn ip_as_u32(&self) -> u32 {
        match self.ip.trim().parse::<IpAddr>() {
            Ok(IpAddr::V4(v4)) => u32::from(v4),
            Ok(IpAddr::V6(v6)) => v6.to_ipv4_mapped().map(u32::from).unwrap_or(0),
            Err(_) => 0,
        }
    }
}

/// Decode a stored `user_ip` value back to dotted form
pub fn ip_from_u32(value: u32) -> String {
    Ipv4Addr::from(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_validation() {
        let valid = "a".repeat(TOKEN_LEN);
        assert!(SessionId::from_string(valid).is_ok());
        assert!(SessionId::from_string("0123456789abcdef".repeat(4)).is_ok());

        // Too short, even if hex
        assert!(SessionId::from_string("0123456789abcdef0123456789abcdef").is_err());
        // Too long
        assert!(SessionId::from_string("a".repeat(TOKEN_LEN + 1)).is_err());
        // Uppercase and non-hex characters
        assert!(SessionId::from_string("A".repeat(TOKEN_LEN)).is_err());
        assert!(SessionId::from_string(format!("{}'", "a".repeat(TOKEN_LEN - 1))).is_err());
        assert!(SessionId::from_string(format!("{} ", "a".repeat(TOKEN_LEN - 1))).is_err());
        assert!(SessionId::from_string("").is_err());
    }

    #[test]
    fn test_session_id_serde_rejects_malformed() {
        let json = format!("\"{}\"", "b".repeat(TOKEN_LEN));
        let id: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(id.as_str().len(), TOKEN_LEN);

        assert!(serde_json::from_str::<SessionId>("\"nope\"").is_err());
    }

    #[test]
    fn test_ip_encoding() {
        assert_eq!(NetworkIdentity::direct("127.0.0.1").ip_as_u32(), 2130706433);
        assert_eq!(NetworkIdentity::direct("255.255.255.255").ip_as_u32(), u32::MAX);
        assert_eq!(NetworkIdentity::direct("::ffff:10.0.0.1").ip_as_u32(), 167772161);
        assert_eq!(NetworkIdentity::direct("2001:db8::1").ip_as_u32(), 0);
        assert_eq!(NetworkIdentity::direct("garbage").ip_as_u32(), 0);
        assert_eq!(ip_from_u32(2130706433), "127.0.0.1");
    }
}
