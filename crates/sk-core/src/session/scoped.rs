//! Flush-on-exit guard

use super::manager::{Phase, SessionManager};
use crate::error::Result;
use std::ops::{Deref, DerefMut};
use tracing::warn;

/// Borrow of an initialized manager that flushes when it goes out of scope.
///
/// Use [`ScopedSession::finish`] to observe the flush result; a flush failure
/// during drop is only logged.
pub struct ScopedSession<'a> {
    manager: &'a mut SessionManager,
    done: bool,
}

impl<'a> ScopedSession<'a> {
    pub(crate) fn new(manager: &'a mut SessionManager) -> Self {
        Self {
            manager,
            done: false,
        }
    }

    /// Flush now and return the outcome
    pub fn finish(mut self) -> Result<()> {
        self.done = true;
        self.manager.flush()
    }
}

impl Deref for ScopedSession<'_> {
    type Target = SessionManager;

    fn deref(&self) -> &Self::Target {
        self.manager
    }
}

impl DerefMut for ScopedSession<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.manager
    }
}

impl Drop for ScopedSession<'_> {
    fn drop(&mut self) {
        if self.done || self.manager.phase() != Phase::Active {
            return;
        }
        if let Err(e) = self.manager.flush() {
            warn!("Session flush on scope exit failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::session::SessionBackend;
    use crate::store::memory::MemoryFallback;
    use crate::transport::{MemoryTransport, RequestContext};
    use crate::types::NetworkIdentity;
    use std::sync::Arc;

    fn manager(fallback: &Arc<MemoryFallback>) -> SessionManager {
        SessionManager::new(
            SessionConfig::default(),
            SessionBackend::Files(fallback.clone()),
            RequestContext::new("localhost", NetworkIdentity::direct("127.0.0.1")),
        )
        .unwrap()
    }

    #[test]
    fn test_drop_flushes_active_session() {
        let fallback = Arc::new(MemoryFallback::new());
        let mut manager = manager(&fallback);
        manager.init(&mut MemoryTransport::new()).unwrap();

        {
            let mut session = manager.scoped();
            session.state_mut().insert_str("lang", "en");
        }

        assert_eq!(manager.phase(), Phase::Flushed);
        assert_eq!(fallback.len(), 1);
    }

    #[test]
    fn test_drop_before_init_is_silent() {
        let fallback = Arc::new(MemoryFallback::new());
        let mut manager = manager(&fallback);
        drop(manager.scoped());
        assert_eq!(manager.phase(), Phase::Initializing);
        assert_eq!(fallback.len(), 0);
    }

    #[test]
    fn test_finish_reports_result_once() {
        let fallback = Arc::new(MemoryFallback::new());
        let mut manager = manager(&fallback);
        manager.init(&mut MemoryTransport::new()).unwrap();

        manager.scoped().finish().unwrap();
        assert_eq!(manager.phase(), Phase::Flushed);
        assert!(manager.scoped().finish().is_err());
    }
}
