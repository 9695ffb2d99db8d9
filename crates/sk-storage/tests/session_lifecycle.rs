//! Request lifecycles against a real SQLite database

use chrono::Utc;
use sk_core::config::SessionConfig;
use sk_core::session::{Phase, SessionBackend, SessionManager, SessionState};
use sk_core::error::Result;
use sk_core::store::{Dialect, Row, SessionRecord, SessionStore, Statement, StorageClient};
use sk_core::transport::{MemoryTransport, RequestContext};
use sk_core::types::{NetworkIdentity, SessionId};
use sk_storage::{FileSystemFallback, SqliteClient};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const GUEST_TTL: i64 = 3600;
const REMEMBER_TTL: i64 = 2_592_000;

fn setup() -> (Arc<SqliteClient>, Arc<SessionStore>) {
    let client = Arc::new(SqliteClient::in_memory().unwrap());
    let store = Arc::new(SessionStore::new(client.clone(), "sessions"));
    (client, store)
}

fn context() -> RequestContext {
    RequestContext::new("shop.example.org", NetworkIdentity::direct("203.0.113.9"))
}

fn manager(store: &Arc<SessionStore>) -> SessionManager {
    SessionManager::new(
        SessionConfig::default(),
        SessionBackend::Database(store.clone()),
        context(),
    )
    .unwrap()
}

fn sid(c: char) -> SessionId {
    SessionId::from_string(c.to_string().repeat(64)).unwrap()
}

fn record(sid: SessionId, payload: Vec<u8>, ends_at: i64) -> SessionRecord {
    let now = Utc::now().timestamp();
    SessionRecord {
        sid,
        user_id: "42".into(),
        user_ip: 3405803785,
        started_at: now,
        ends_at,
        last_seen_at: now,
        payload,
    }
}

fn row_count(client: &SqliteClient) -> i64 {
    client
        .fetch_row(&Statement::new("SELECT COUNT(*) AS n FROM sessions"))
        .unwrap()
        .and_then(|row| row.get_i64("n"))
        .unwrap()
}

fn cookie_ttl(transport: &MemoryTransport) -> i64 {
    transport
        .outbound_cookie("cms")
        .and_then(|c| c.expires_datetime())
        .map(|t| t.unix_timestamp() - Utc::now().timestamp())
        .unwrap()
}

#[test]
fn upsert_then_load_preserves_payload_bytes() {
    let (_client, store) = setup();
    store.ensure_schema().unwrap();

    let payload = vec![0u8, 159, 146, 150, 255, b'{'];
    let written = record(sid('a'), payload.clone(), Utc::now().timestamp() + 60);
    store.upsert(&written).unwrap();

    let loaded = store.load(&sid('a')).unwrap().unwrap();
    assert_eq!(loaded.user_id, "42");
    assert_eq!(loaded.payload, payload);
    assert_eq!(loaded.user_ip, 3405803785);
    assert_eq!(loaded.ends_at, written.ends_at);
}

#[test]
fn second_upsert_updates_in_place() {
    let (client, store) = setup();
    store.ensure_schema().unwrap();
    let ends_at = Utc::now().timestamp() + 60;

    let mut first = record(sid('b'), b"{}".to_vec(), ends_at);
    first.started_at = 100;
    store.upsert(&first).unwrap();

    let mut second = record(sid('b'), br#"{"k":1}"#.to_vec(), ends_at + 10);
    second.started_at = 999;
    store.upsert(&second).unwrap();

    let loaded = store.load(&sid('b')).unwrap().unwrap();
    assert_eq!(row_count(&client), 1);
    assert_eq!(loaded.payload, br#"{"k":1}"#.to_vec());
    assert_eq!(loaded.started_at, 100);
    assert_eq!(loaded.ends_at, ends_at + 10);
}

#[test]
fn sweep_removes_expired_records() {
    let (client, store) = setup();
    store.ensure_schema().unwrap();
    let now = Utc::now().timestamp();

    store.upsert(&record(sid('c'), b"{}".to_vec(), now - 1)).unwrap();
    store.upsert(&record(sid('d'), b"{}".to_vec(), now + 60)).unwrap();

    assert_eq!(store.sweep_expired(now).unwrap(), 1);
    assert!(store.load(&sid('c')).unwrap().is_none());
    assert!(store.load(&sid('d')).unwrap().is_some());
    assert_eq!(row_count(&client), 1);
}

#[test]
fn new_visitor_gets_guest_session() {
    let (client, store) = setup();
    let mut manager = manager(&store);
    let mut transport = MemoryTransport::new();

    let sid = manager.init(&mut transport).unwrap().clone();
    assert!((cookie_ttl(&transport) - GUEST_TTL).abs() <= 2);
    assert_eq!(manager.state().ip(), Some("203.0.113.9"));

    manager.flush().unwrap();
    assert_eq!(manager.phase(), Phase::Flushed);

    let stored = store.load(&sid).unwrap().unwrap();
    assert!((stored.ends_at - Utc::now().timestamp() - GUEST_TTL).abs() <= 2);
    assert_eq!(stored.user_id, "");
    assert_eq!(stored.state().ip(), Some("203.0.113.9"));
    assert_eq!(row_count(&client), 1);
}

#[test]
fn remembered_session_is_extended_on_flush() {
    let (_client, store) = setup();
    store.ensure_schema().unwrap();
    let now = Utc::now().timestamp();
    store
        .upsert(&record(
            sid('e'),
            br#"{"remember":true,"cart":[1,2]}"#.to_vec(),
            now + 120,
        ))
        .unwrap();

    let mut manager = manager(&store);
    let mut transport = MemoryTransport::new().with_cookie("cms", sid('e').as_str());
    let resolved = manager.init(&mut transport).unwrap().clone();

    assert_eq!(resolved, sid('e'));
    assert_eq!(manager.state().user_id(), "42");
    assert!((cookie_ttl(&transport) - REMEMBER_TTL).abs() <= 2);

    manager.flush().unwrap();
    let stored = store.load(&sid('e')).unwrap().unwrap();
    assert!((stored.ends_at - Utc::now().timestamp() - REMEMBER_TTL).abs() <= 2);
    assert_eq!(stored.user_id, "42");
    assert!(stored.state().contains_key("cart"));
}

#[test]
fn state_carries_over_between_requests() {
    let (_client, store) = setup();

    let mut first = manager(&store);
    let sid = first.init(&mut MemoryTransport::new()).unwrap().clone();
    first.state_mut().set_user_id("7");
    first.state_mut().insert("theme", "dark").unwrap();
    first.flush().unwrap();

    let proxied = RequestContext::new(
        "shop.example.org",
        NetworkIdentity::proxied("198.51.100.4", "203.0.113.9"),
    );
    let mut second = SessionManager::new(
        SessionConfig::default(),
        SessionBackend::Database(store.clone()),
        proxied,
    )
    .unwrap();
    second
        .init(&mut MemoryTransport::new().with_cookie("cms", sid.as_str()))
        .unwrap();

    let state = second.state();
    assert_eq!(state.user_id(), "7");
    assert_eq!(state.get_str("theme"), Some("dark"));
    assert_eq!(state.ip(), Some("198.51.100.4"));
    assert_eq!(state.get_str("ip_old"), Some("203.0.113.9"));
    assert_eq!(state.proxy(), Some("203.0.113.9"));
    assert_eq!(state.get_str("proxy_old"), Some(""));
}

#[test]
fn malformed_cookie_gets_fresh_token() {
    let (_client, store) = setup();
    let mut manager = manager(&store);
    let mut transport = MemoryTransport::new().with_cookie("cms", "x' OR '1'='1");

    let sid = manager.init(&mut transport).unwrap().clone();
    assert_ne!(sid.as_str(), "x' OR '1'='1");
    assert_eq!(
        transport.outbound_cookie("cms").map(|c| c.value().to_string()),
        Some(sid.to_string())
    );
}

#[test]
fn load_fault_yields_anonymous_session_without_writes() {
    let (client, store) = setup();
    store.ensure_schema().unwrap();
    client.query(&Statement::new("DROP TABLE sessions")).unwrap();

    let mut manager = manager(&store);
    let mut transport = MemoryTransport::new().with_cookie("cms", sid('f').as_str());
    manager.init(&mut transport).unwrap();

    assert_eq!(manager.state().user_id(), "");
    assert!(!manager.state().remember());
    assert!(!manager.is_database_backed());
    assert!(transport.outbound_cookie("cms").is_some());

    manager.flush().unwrap();
    assert!(client.list_tables().unwrap().is_empty());

    let mut later = self::manager(&store);
    later.init(&mut MemoryTransport::new()).unwrap();
    assert!(!later.is_database_backed());
    later.flush().unwrap();
    assert!(client.list_tables().unwrap().is_empty());
}

/// Deletes the session rows right after the next existence check, the way a
/// concurrent expiry sweep from another process would.
struct SweptAfterCount {
    inner: SqliteClient,
    armed: AtomicBool,
}

impl StorageClient for SweptAfterCount {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    fn list_tables(&self) -> Result<Vec<String>> {
        self.inner.list_tables()
    }

    fn query(&self, statement: &Statement) -> Result<u64> {
        self.inner.query(statement)
    }

    fn fetch_row(&self, statement: &Statement) -> Result<Option<Row>> {
        let row = self.inner.fetch_row(statement)?;
        if statement.sql.starts_with("SELECT COUNT") && self.armed.swap(false, Ordering::SeqCst) {
            self.inner.query(&Statement::new("DELETE FROM sessions"))?;
        }
        Ok(row)
    }
}

#[test]
fn row_swept_between_count_and_update_is_reinserted() {
    let client = Arc::new(SweptAfterCount {
        inner: SqliteClient::in_memory().unwrap(),
        armed: AtomicBool::new(false),
    });
    let store = Arc::new(SessionStore::new(client.clone(), "sessions"));

    let mut first = manager(&store);
    let sid = first.init(&mut MemoryTransport::new()).unwrap().clone();
    first.flush().unwrap();

    client.armed.store(true, Ordering::SeqCst);
    let mut second = manager(&store);
    second
        .init(&mut MemoryTransport::new().with_cookie("cms", sid.as_str()))
        .unwrap();
    second.state_mut().insert_str("step", "checkout");
    second.flush().unwrap();

    assert!(store.is_available());
    let stored = store.load(&sid).unwrap().unwrap();
    assert_eq!(stored.state().get_str("step"), Some("checkout"));
    assert_eq!(row_count(&client.inner), 1);

    let mut later = manager(&store);
    later.init(&mut MemoryTransport::new()).unwrap();
    assert!(later.is_database_backed());
}

#[test]
fn concurrent_upserts_leave_one_row() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("sessions.db");

    let setup_client = Arc::new(SqliteClient::open(&path).unwrap());
    SessionStore::new(setup_client.clone(), "sessions")
        .ensure_schema()
        .unwrap();

    let payloads = [br#"{"writer":1}"#.to_vec(), br#"{"writer":2}"#.to_vec()];
    let barrier = Arc::new(Barrier::new(payloads.len()));
    let ends_at = Utc::now().timestamp() + 60;

    let handles: Vec<_> = payloads
        .iter()
        .cloned()
        .map(|payload| {
            let path = path.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let client = SqliteClient::open(&path)
                    .unwrap()
                    .with_busy_timeout(Duration::from_secs(5))
                    .unwrap();
                let store = SessionStore::new(Arc::new(client), "sessions");
                barrier.wait();
                store.upsert(&record(sid('9'), payload, ends_at)).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(row_count(&setup_client), 1);
    let stored = SessionStore::new(setup_client, "sessions")
        .load(&sid('9'))
        .unwrap()
        .unwrap();
    assert!(payloads.contains(&stored.payload));
    assert!(SessionState::decode(&stored.payload).is_ok());
}

#[test]
fn file_fallback_lifecycle() {
    let temp = TempDir::new().unwrap();
    let fallback = Arc::new(FileSystemFallback::new(temp.path().join("sessions")).unwrap());
    let config = SessionConfig {
        use_database: false,
        ..SessionConfig::default()
    };

    let mut first = SessionManager::new(
        config.clone(),
        SessionBackend::Files(fallback.clone()),
        context(),
    )
    .unwrap();
    let sid = first.init(&mut MemoryTransport::new()).unwrap().clone();
    first.state_mut().set_remember(true);
    first.flush().unwrap();

    let mut second =
        SessionManager::new(config, SessionBackend::Files(fallback), context()).unwrap();
    let mut transport = MemoryTransport::new().with_cookie("cms", sid.as_str());
    second.init(&mut transport).unwrap();
    assert!(second.state().remember());
    assert!((cookie_ttl(&transport) - REMEMBER_TTL).abs() <= 2);
}
