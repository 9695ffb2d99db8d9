//! Session table CRUD

use super::client::{SqlValue, StorageClient};
use super::dialect::COL_SID;
use super::record::SessionRecord;
use super::schema::SchemaProvisioner;
use crate::config::SessionConfig;
use crate::error::Result;
use crate::types::SessionId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which write `upsert` ended up issuing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Session table access shared by every manager in the process.
///
/// Holds the process-lifetime flags: whether the schema has been checked, and
/// whether a storage fault has switched database persistence off.
pub struct SessionStore {
    client: Arc<dyn StorageClient>,
    table: String,
    provisioned: AtomicBool,
    disabled: AtomicBool,
}

impl SessionStore {
    /// Create a store over `client` using `table`
    pub fn new(client: Arc<dyn StorageClient>, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
            provisioned: AtomicBool::new(false),
            disabled: AtomicBool::new(false),
        }
    }

    /// Create a store using the configured table name
    pub fn from_config(client: Arc<dyn StorageClient>, config: &SessionConfig) -> Self {
        Self::new(client, config.table_name.clone())
    }

    /// Backing table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Whether database persistence is still enabled
    pub fn is_available(&self) -> bool {
        !self.disabled.load(Ordering::Acquire)
    }

    /// Switch database persistence off for the rest of the process
    pub fn disable(&self, reason: &str) {
        if !self.disabled.swap(true, Ordering::AcqRel) {
            warn!("Disabling database session persistence: {}", reason);
        }
    }

    /// Make sure the session table exists. Runs the check once per store;
    /// a provisioning failure disables the store.
    pub fn ensure_schema(&self) -> Result<()> {
        if self.provisioned.load(Ordering::Acquire) {
            return Ok(());
        }
        match SchemaProvisioner::ensure_table(self.client.as_ref(), &self.table) {
            Ok(_) => {
                self.provisioned.store(true, Ordering::Release);
                Ok(())
            }
            Err(e) => {
                self.disable(&e.to_string());
                Err(e)
            }
        }
    }

    /// Delete every record whose end time has passed
    pub fn sweep_expired(&self, now: i64) -> Result<u64> {
        let stmt = self.client.dialect().delete_expired(&self.table, now);
        let deleted = self.client.query(&stmt)?;
        if deleted > 0 {
            info!("Swept {} expired sessions", deleted);
        }
        Ok(deleted)
    }

    /// Point lookup by session id
    pub fn load(&self, sid: &SessionId) -> Result<Option<SessionRecord>> {
        let stmt = self.client.dialect().select_by_sid(&self.table, sid.as_str());
        let row = self.client.fetch_row(&stmt)?;
        debug!(
            "Session {} {}",
            sid,
            if row.is_some() { "found" } else { "not found" }
        );
        Ok(row.map(|row| SessionRecord::from_row(sid.clone(), &row)))
    }

    /// Sweep, then look up. A failing sweep is logged and does not block the
    /// lookup.
    pub fn sweep_and_load(&self, sid: &SessionId, now: i64) -> Result<Option<SessionRecord>> {
        if let Err(e) = self.sweep_expired(now) {
            warn!("Expired session sweep failed: {}", e);
        }
        self.load(sid)
    }

    /// Whether a row exists for `sid`
    pub fn exists(&self, sid: &SessionId) -> Result<bool> {
        let stmt = self.client.dialect().count_by_sid(&self.table, sid.as_str());
        let count = self
            .client
            .fetch_row(&stmt)?
            .and_then(|row| row.get_i64("n").or_else(|| match row.first() {
                Some(SqlValue::Integer(n)) => Some(*n),
                _ => None,
            }))
            .unwrap_or(0);
        Ok(count > 0)
    }

    /// Write `record`: update by key when the row exists, insert otherwise.
    ///
    /// An update that matches no rows (the row was swept after the existence
    /// check, or the client counts changed rather than matched rows) falls
    /// through to the insert. An insert that loses a race against a
    /// concurrent insert of the same id is retried as an update, so the last
    /// writer wins. Only a failing statement is an error.
    pub fn upsert(&self, record: &SessionRecord) -> Result<UpsertOutcome> {
        if self.exists(&record.sid)? {
            if self.update(record)? > 0 {
                return Ok(UpsertOutcome::Updated);
            }
            debug!("Update of session {} matched no rows, inserting", record.sid);
        }

        let insert = self.client.build_insert(&self.table, &record.insert_fields());
        match self.client.query(&insert) {
            Ok(_) => {
                debug!("Inserted session {}", record.sid);
                Ok(UpsertOutcome::Inserted)
            }
            Err(insert_err) => {
                if !self.exists(&record.sid).unwrap_or(false) {
                    return Err(insert_err);
                }
                debug!("Insert of session {} raced, updating instead", record.sid);
                self.update(record)?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    /// Update by key, returning the affected row count
    fn update(&self, record: &SessionRecord) -> Result<u64> {
        let keys = [(COL_SID, SqlValue::from(record.sid.as_str()))];
        let update = self
            .client
            .build_update(&self.table, &record.update_fields(), &keys);
        let affected = self.client.query(&update)?;
        debug!("Updated session {} ({} rows)", record.sid, affected);
        Ok(affected)
    }
}
