//! sk-core - Core library for session-keeper
//!
//! This crate provides the per-request session lifecycle: identifier
//! minting, cookie policy, client identity reconciliation, and persistence
//! through a pluggable relational client.

pub mod config;
pub mod error;
pub mod policy;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

pub use error::{Result, SessionError};
pub use types::*;
