//! Persisted session row

use super::client::{Row, SqlValue};
use super::dialect::{
    COL_ENDS, COL_LAST_SEEN, COL_PAYLOAD, COL_SID, COL_STARTED, COL_USER_ID, COL_USER_IP,
};
use crate::session::SessionState;
use crate::types::SessionId;
use tracing::warn;

/// One row of the session table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Session token, primary key
    pub sid: SessionId,
    /// Authenticated user, empty for anonymous sessions
    pub user_id: String,
    /// Client IPv4 address as unsigned integer
    pub user_ip: u32,
    /// Creation time, epoch seconds
    pub started_at: i64,
    /// Expiry time, epoch seconds
    pub ends_at: i64,
    /// Last write time, epoch seconds
    pub last_seen_at: i64,
    /// Serialized session mapping, opaque to the store
    pub payload: Vec<u8>,
}

impl SessionRecord {
    /// Build a record from a fetched row. The row is trusted to belong to `sid`.
    pub fn from_row(sid: SessionId, row: &Row) -> Self {
        Self {
            sid,
            user_id: row.get_text(COL_USER_ID).unwrap_or_default(),
            user_ip: row
                .get_i64(COL_USER_IP)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(0),
            started_at: row.get_i64(COL_STARTED).unwrap_or(0),
            ends_at: row.get_i64(COL_ENDS).unwrap_or(0),
            last_seen_at: row.get_i64(COL_LAST_SEEN).unwrap_or(0),
            payload: row.get_bytes(COL_PAYLOAD).unwrap_or_default(),
        }
    }

    /// Columns written on every flush
    pub(crate) fn update_fields(&self) -> Vec<(&'static str, SqlValue)> {
        vec![
            (COL_USER_ID, SqlValue::from(self.user_id.as_str())),
            (COL_USER_IP, SqlValue::from(self.user_ip)),
            (COL_ENDS, SqlValue::from(self.ends_at)),
            (COL_LAST_SEEN, SqlValue::from(self.last_seen_at)),
            (COL_PAYLOAD, SqlValue::from(self.payload.clone())),
        ]
    }

    /// Columns written when the row is first created
    pub(crate) fn insert_fields(&self) -> Vec<(&'static str, SqlValue)> {
        let mut fields = vec![(COL_SID, SqlValue::from(self.sid.as_str()))];
        fields.extend(self.update_fields());
        fields.push((COL_STARTED, SqlValue::from(self.started_at)));
        fields
    }

    /// Whether the record has expired at `now`
    pub fn is_expired(&self, now: i64) -> bool {
        self.ends_at < now
    }

    /// Decode the payload. A corrupt payload yields empty state.
    pub fn state(&self) -> SessionState {
        match SessionState::decode(&self.payload) {
            Ok(state) => state,
            Err(e) => {
                warn!("Discarding corrupt payload of session {}: {}", self.sid, e);
                SessionState::new()
            }
        }
    }
}
