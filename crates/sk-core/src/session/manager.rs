//! Session manager: one instance per request

use super::diagnostics::{Diagnostics, DiagnosticsReport};
use super::identifier::IdentifierGenerator;
use super::reconcile::MetadataReconciler;
use super::scoped::ScopedSession;
use super::state::SessionState;
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::policy::{write_cache_headers, CookiePolicy};
use crate::store::{FallbackStore, SessionRecord, SessionStore};
use crate::transport::{RequestContext, Transport};
use crate::types::SessionId;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle phase of a manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Default value only; a constructed manager starts in `Initializing`
    #[default]
    Uninitialized,
    /// Configuration captured, waiting for `init()`
    Initializing,
    /// Session resolved, state available
    Active,
    /// State persisted; terminal
    Flushed,
}

/// Where session state is persisted between requests
#[derive(Clone)]
pub enum SessionBackend {
    /// Session table, shared by every manager in the process
    Database(Arc<SessionStore>),
    /// File-backed fallback, used when no database is configured
    Files(Arc<dyn FallbackStore>),
    /// Nothing beyond the cookie itself
    CookieOnly,
}

/// Manager for one request's session lifecycle
pub struct SessionManager {
    config: SessionConfig,
    policy: CookiePolicy,
    generator: IdentifierGenerator,
    backend: SessionBackend,
    context: RequestContext,
    phase: Phase,
    sid: Option<SessionId>,
    state: SessionState,
    diagnostics: Diagnostics,
}

impl SessionManager {
    /// Capture configuration for one request. Performs no I/O.
    pub fn new(
        config: SessionConfig,
        backend: SessionBackend,
        context: RequestContext,
    ) -> Result<Self> {
        config.validate()?;
        let mut diagnostics = Diagnostics::new(config.debug, config.log_file.clone());
        diagnostics.step("Session manager constructed");

        let backend = match backend {
            SessionBackend::Database(_) if !config.use_database => {
                diagnostics.step("The session does not use a database");
                SessionBackend::CookieOnly
            }
            SessionBackend::Database(store) => {
                diagnostics.step("The session uses a database");
                SessionBackend::Database(store)
            }
            other => other,
        };

        Ok(Self {
            policy: CookiePolicy::from_config(&config),
            generator: IdentifierGenerator::new(),
            config,
            backend,
            context,
            phase: Phase::Initializing,
            sid: None,
            state: SessionState::new(),
            diagnostics,
        })
    }

    /// Resolve the session for this request.
    ///
    /// Provisions the schema on first use, reuses a well-formed inbound token
    /// or mints a new one, loads and reconciles stored state, then writes the
    /// session cookie and no-cache headers. Storage faults degrade to a fresh
    /// anonymous session; the only error is calling `init` twice.
    pub fn init(&mut self, transport: &mut dyn Transport) -> Result<&SessionId> {
        if self.phase != Phase::Initializing {
            return Err(SessionError::InvalidState(format!(
                "init called in phase {:?}",
                self.phase
            )));
        }
        self.diagnostics.step("Session INIT");

        if let Some(store) = self.database() {
            if let Err(e) = store.ensure_schema() {
                self.diagnostics
                    .error(format!("Session INIT error: no session table ({})", e));
            }
        }

        let now = Utc::now();
        let sid = self.resolve_identifier(transport);
        let stored = self.load_state(&sid, now.timestamp());
        self.state = MetadataReconciler::merge(stored, &self.context.identity);

        let ttl = self.ttl();
        let cookie =
            self.policy
                .session_cookie(&self.config.session_name, &sid, &self.context, ttl, now);
        self.diagnostics.step(format!("Session cookie: {}", cookie));
        transport.set_cookie(cookie);
        write_cache_headers(transport, now);

        self.diagnostics.step(format!("Session ID: {}", sid));
        self.phase = Phase::Active;
        let sid: &SessionId = self.sid.insert(sid);
        Ok(sid)
    }

    /// Persist the in-memory state. Terminal: the manager cannot be reused.
    ///
    /// Returns `FlushBeforeInit` without writing anything when `init` has not
    /// run. In cookie-only mode, including after a storage fault, nothing is
    /// written and the flush succeeds.
    pub fn flush(&mut self) -> Result<()> {
        match self.phase {
            Phase::Active => {}
            Phase::Flushed => {
                return Err(SessionError::InvalidState("session already flushed".into()))
            }
            Phase::Uninitialized | Phase::Initializing => {
                self.diagnostics.error("Set session error: session not started");
                return Err(SessionError::FlushBeforeInit);
            }
        }
        let Some(sid) = self.sid.clone() else {
            self.diagnostics.error("Set session error: session id not found");
            return Err(SessionError::InvalidState("no session id".into()));
        };
        self.phase = Phase::Flushed;

        let now = Utc::now().timestamp();
        let ends_at = now.saturating_add(self.ttl().as_secs() as i64);

        if let Some(store) = self.database() {
            let record = SessionRecord {
                sid,
                user_id: self.state.user_id().to_string(),
                user_ip: self.context.identity.ip_as_u32(),
                started_at: now,
                ends_at,
                last_seen_at: now,
                payload: self.state.encode()?,
            };
            self.diagnostics.step("Saving session data to database");
            if let Err(e) = store.upsert(&record) {
                store.disable(&e.to_string());
                self.diagnostics.error(format!("Set session error: {}", e));
                return Err(match e {
                    SessionError::StorageUnavailable(_) => e,
                    other => SessionError::StorageUnavailable(other.to_string()),
                });
            }
            return Ok(());
        }

        if let SessionBackend::Files(fallback) = &self.backend {
            let fallback = Arc::clone(fallback);
            self.diagnostics.step("Saving session data to file storage");
            if let Err(e) = fallback.save(&sid, &self.state, ends_at) {
                self.diagnostics.error(format!("Set session error: {}", e));
                return Err(e);
            }
            return Ok(());
        }

        self.diagnostics
            .step("Session data not persisted: cookie-only mode");
        Ok(())
    }

    /// Guard that flushes when dropped
    pub fn scoped(&mut self) -> ScopedSession<'_> {
        ScopedSession::new(self)
    }

    /// Token of the current session, once resolved
    pub fn current_session_id(&self) -> Option<&SessionId> {
        self.sid.as_ref()
    }

    /// Active session state
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Mutable access to the active session state
    pub fn state_mut(&mut self) -> &mut SessionState {
        &mut self.state
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Session lifetime implied by the current state
    pub fn ttl(&self) -> Duration {
        self.policy.resolve_ttl(self.state.remember())
    }

    /// Whether state is currently persisted to the database
    pub fn is_database_backed(&self) -> bool {
        self.database().is_some()
    }

    /// Collected diagnostics and their destination name
    pub fn diagnostics(&self) -> DiagnosticsReport {
        self.diagnostics.report()
    }

    /// Serving context of this request
    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    /// Configuration captured at construction
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Database store, unless absent or switched off by an earlier fault
    fn database(&self) -> Option<Arc<SessionStore>> {
        match &self.backend {
            SessionBackend::Database(store) if store.is_available() => Some(Arc::clone(store)),
            _ => None,
        }
    }

    fn resolve_identifier(&mut self, transport: &dyn Transport) -> SessionId {
        match transport.cookie(&self.config.session_name) {
            Some(value) if !value.is_empty() => match SessionId::from_string(value) {
                Ok(sid) => {
                    self.diagnostics
                        .step(format!("Session ID from cookie: {}", sid));
                    sid
                }
                Err(e) => {
                    self.diagnostics
                        .step(format!("Replacing inbound session id: {}", e));
                    self.generator.generate()
                }
            },
            _ => self.generator.generate(),
        }
    }

    fn load_state(&mut self, sid: &SessionId, now: i64) -> SessionState {
        if let Some(store) = self.database() {
            self.diagnostics.step("Loading session data from database");
            let (mut state, user_id) = match store.sweep_and_load(sid, now) {
                Ok(Some(record)) => {
                    let state = match SessionState::decode(&record.payload) {
                        Ok(state) => state,
                        Err(e) => {
                            self.diagnostics
                                .error(format!("Discarding stored session data: {}", e));
                            SessionState::new()
                        }
                    };
                    (state, record.user_id)
                }
                Ok(None) => (SessionState::new(), String::new()),
                Err(e) => {
                    store.disable(&e.to_string());
                    self.diagnostics.error(format!(
                        "Session load failed, continuing without database: {}",
                        e
                    ));
                    (SessionState::new(), String::new())
                }
            };
            state.set_user_id(user_id);
            return state;
        }

        if let SessionBackend::Files(fallback) = &self.backend {
            let fallback = Arc::clone(fallback);
            self.diagnostics.step("Loading session data from file storage");
            return match fallback.load(sid, now) {
                Ok(state) => state.unwrap_or_default(),
                Err(e) => {
                    self.diagnostics
                        .error(format!("Session file load failed: {}", e));
                    SessionState::new()
                }
            };
        }

        SessionState::new()
    }
}
