//! In-memory session state

use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reserved key: last observed client IP
pub const KEY_IP: &str = "ip";
/// Reserved key: last observed proxy IP
pub const KEY_PROXY: &str = "proxy";
/// Reserved key: authenticated user, empty for anonymous sessions
pub const KEY_USER_ID: &str = "user_id";
/// Reserved key: long-lived session flag
pub const KEY_REMEMBER: &str = "remember";

/// Key under which the previous value of a tracked attribute is kept
pub fn old_key(key: &str) -> String {
    format!("{}_old", key)
}

/// String-keyed session mapping owned by one manager instance.
///
/// Values are arbitrary JSON; the core only interprets the reserved keys
/// (`ip`, `proxy`, `user_id`, `remember`) and passes everything else through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionState {
    data: BTreeMap<String, serde_json::Value>,
}

impl SessionState {
    /// Create empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode for the storage boundary
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.data)?)
    }

    /// Decode a stored payload. An empty payload decodes to empty state.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }
        serde_json::from_slice(payload).map_err(|e| SessionError::PayloadDecode(e.to_string()))
    }

    /// Check if state is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Get a typed value by key
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get a string value by key
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key)?.as_str()
    }

    /// Set a value by key
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.data.insert(key.into(), value);
        Ok(())
    }

    /// Set a raw JSON value by key
    pub fn insert_value(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.data.insert(key.into(), value);
    }

    /// Set a string value by key
    pub fn insert_str(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data
            .insert(key.into(), serde_json::Value::String(value.into()));
    }

    /// Remove a value by key
    pub fn remove(&mut self, key: &str) -> Option<serde_json::Value> {
        self.data.remove(key)
    }

    /// Check if a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.data.iter()
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Last observed client IP
    pub fn ip(&self) -> Option<&str> {
        self.get_str(KEY_IP)
    }

    /// Last observed proxy IP
    pub fn proxy(&self) -> Option<&str> {
        self.get_str(KEY_PROXY)
    }

    /// Authenticated user id, empty for anonymous sessions
    pub fn user_id(&self) -> &str {
        self.get_str(KEY_USER_ID).unwrap_or_default()
    }

    /// Set the authenticated user id
    pub fn set_user_id(&mut self, user_id: impl Into<String>) {
        self.insert_str(KEY_USER_ID, user_id);
    }

    /// Whether the session asked for the long TTL.
    /// Accepts booleans, non-zero numbers and non-empty strings other than "0".
    pub fn remember(&self) -> bool {
        match self.data.get(KEY_REMEMBER) {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
            Some(serde_json::Value::String(s)) => !s.is_empty() && s != "0",
            _ => false,
        }
    }

    /// Set the long TTL flag
    pub fn set_remember(&mut self, remember: bool) {
        self.data
            .insert(KEY_REMEMBER.to_string(), serde_json::Value::Bool(remember));
    }
}
