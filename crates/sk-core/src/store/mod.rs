//! Session persistence
//!
//! The store talks to the backing table through the narrow [`StorageClient`]
//! capability interface: table listing, statement execution, single-row
//! fetch, and INSERT/UPDATE builders. SQL text is rendered per [`Dialect`].
//!
//! Concurrent writers to the same session id are not serialized here: the last
//! `upsert` wins, and the primary key keeps it to one row per id.

mod client;
mod dialect;
mod fallback;
mod record;
mod schema;
mod session_store;

pub use client::{Row, SqlValue, Statement, StorageClient};
pub use dialect::{
    Dialect, COL_ENDS, COL_LAST_SEEN, COL_PAYLOAD, COL_SID, COL_STARTED, COL_USER_ID, COL_USER_IP,
};
pub use fallback::FallbackStore;
pub use record::SessionRecord;
pub use schema::SchemaProvisioner;
pub use session_store::{SessionStore, UpsertOutcome};

#[cfg(test)]
pub(crate) use client::recording;
#[cfg(test)]
pub(crate) use fallback::memory;
