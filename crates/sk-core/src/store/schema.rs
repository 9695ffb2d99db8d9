//! Lazy creation of the session table

use super::client::StorageClient;
use crate::error::{Result, SessionError};
use tracing::{debug, info};

/// Ensures the session table exists before first use
pub struct SchemaProvisioner;

impl SchemaProvisioner {
    /// Create `table` if it is missing. Returns `true` when it was created.
    ///
    /// A failed CREATE is re-checked against the table list, so a concurrent
    /// process creating the same table does not count as a failure.
    pub fn ensure_table(client: &dyn StorageClient, table: &str) -> Result<bool> {
        let tables = client
            .list_tables()
            .map_err(|e| SessionError::Provisioning(e.to_string()))?;
        if tables.iter().any(|t| t == table) {
            debug!("Session table {} already exists", table);
            return Ok(false);
        }

        let create = client.dialect().create_table(table);
        match client.query(&create) {
            Ok(_) => {
                info!("Created session table {}", table);
                Ok(true)
            }
            Err(e) => {
                let exists_now = client
                    .list_tables()
                    .map(|tables| tables.iter().any(|t| t == table))
                    .unwrap_or(false);
                if exists_now {
                    debug!("Session table {} created concurrently", table);
                    Ok(false)
                } else {
                    Err(SessionError::Provisioning(format!(
                        "could not create table {}: {}",
                        table, e
                    )))
                }
            }
        }
    }
}
