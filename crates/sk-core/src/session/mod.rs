//! Session lifecycle
//!
//! One [`SessionManager`] serves one request. It moves through
//! `Initializing -> Active -> Flushed`:
//!
//! - `init` resolves the token from the inbound cookie (or mints one), loads
//!   and reconciles stored state, and writes the cookie and cache headers
//! - the caller reads and mutates [`SessionState`]
//! - `flush` persists the state; [`ScopedSession`] does it on scope exit
//!
//! Storage faults never fail a request: the manager degrades to a cookie-only
//! session and records the fault in its diagnostics.
//!
//! # Example
//!
//! ```ignore
//! use sk_core::session::{SessionBackend, SessionManager};
//!
//! let mut manager = SessionManager::new(config, SessionBackend::Database(store), context)?;
//! manager.init(&mut transport)?;
//! let mut session = manager.scoped();
//! session.state_mut().set_user_id("42");
//! session.finish()?;
//! ```

mod diagnostics;
mod identifier;
mod manager;
mod reconcile;
mod scoped;
mod state;

pub use diagnostics::DiagnosticsReport;
pub use identifier::IdentifierGenerator;
pub use manager::{Phase, SessionBackend, SessionManager};
pub use reconcile::MetadataReconciler;
pub use scoped::ScopedSession;
pub use state::{old_key, SessionState, KEY_IP, KEY_PROXY, KEY_REMEMBER, KEY_USER_ID};
