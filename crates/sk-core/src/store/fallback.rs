//! Database-less session persistence

use crate::error::Result;
use crate::session::SessionState;
use crate::types::SessionId;

/// Persistence used when the manager is configured without a database.
///
/// Implementations decide where state lives; they must ignore state whose
/// end time has passed.
pub trait FallbackStore: Send + Sync {
    /// Load live state for `sid`
    fn load(&self, sid: &SessionId, now: i64) -> Result<Option<SessionState>>;

    /// Persist state for `sid` until `ends_at`
    fn save(&self, sid: &SessionId, state: &SessionState, ends_at: i64) -> Result<()>;
}

/// In-memory fallback for tests
#[cfg(test)]
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    #[derive(Default)]
    pub struct MemoryFallback {
        entries: RwLock<HashMap<SessionId, (SessionState, i64)>>,
    }

    impl MemoryFallback {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn len(&self) -> usize {
            self.entries.read().unwrap().len()
        }
    }

    impl FallbackStore for MemoryFallback {
        fn load(&self, sid: &SessionId, now: i64) -> Result<Option<SessionState>> {
            let entries = self.entries.read().unwrap();
            Ok(entries
                .get(sid)
                .filter(|(_, ends_at)| *ends_at >= now)
                .map(|(state, _)| state.clone()))
        }

        fn save(&self, sid: &SessionId, state: &SessionState, ends_at: i64) -> Result<()> {
            let mut entries = self.entries.write().unwrap();
            entries.insert(sid.clone(), (state.clone(), ends_at));
            Ok(())
        }
    }
}
