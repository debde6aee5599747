use async_trait::async_trait;
use session_mysqlstore::config::{Config, DbConfig};
use session_mysqlstore::db::{MysqlStore, SqlStoreOptions};
use session_mysqlstore::store::FilesystemOptions;
use session_mysqlstore::{
    Connector, ExponentialBackoff, FixedBackoff, ResilientInitializer, SessionRecord,
    SessionStore, StoreError, StoreHandle, StoreRegistry, acquire_and_register,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::Instant;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn temp_path(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    std::env::temp_dir().join(format!(
        "session-mysqlstore-{tag}-{}-{}",
        std::process::id(),
        nanos
    ))
}

fn fallback_in(tag: &str) -> FilesystemOptions {
    FilesystemOptions {
        save_path: Some(temp_path(tag)),
        key_pairs: vec!["secret-key".to_string()],
        check_interval: Duration::from_secs(60),
    }
}

/// Stand-in for the database-backed store.
struct DbStore;

#[async_trait]
impl SessionStore for DbStore {
    fn backend(&self) -> &'static str {
        "db"
    }

    async fn load(&self, _id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(None)
    }

    async fn save(&self, _record: &SessionRecord) -> Result<(), StoreError> {
        Ok(())
    }

    async fn delete(&self, _id: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        Ok(0)
    }
}

/// Fails the first `failures` attempts, then succeeds.
#[derive(Clone)]
struct ScriptedConnector {
    failures: usize,
    attempts: Arc<AtomicUsize>,
}

impl ScriptedConnector {
    fn failing(failures: usize) -> Self {
        Self {
            failures,
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn always_failing() -> Self {
        Self::failing(usize::MAX)
    }

    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self) -> Result<StoreHandle, StoreError> {
        let n = self.attempts.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        Ok(Arc::new(DbStore))
    }
}

/// In-memory database that executes the store's DDL statements.
#[derive(Default)]
struct FakeDatabase {
    ddl_calls: usize,
    tables: HashMap<String, HashMap<String, SessionRecord>>,
}

impl FakeDatabase {
    fn execute_ddl(&mut self, table: &str, stmt: &str) -> Result<(), StoreError> {
        self.ddl_calls += 1;
        let exists = self.tables.contains_key(table);
        if exists && !stmt.starts_with("CREATE TABLE IF NOT EXISTS") {
            return Err(StoreError::InvalidTableName(format!("{table} already exists")));
        }
        self.tables.entry(table.to_string()).or_default();
        Ok(())
    }
}

struct FakeTableStore {
    db: Arc<Mutex<FakeDatabase>>,
    table: String,
}

#[async_trait]
impl SessionStore for FakeTableStore {
    fn backend(&self) -> &'static str {
        "db"
    }

    async fn load(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let db = self.db.lock().unwrap();
        Ok(db.tables[&self.table].get(id).cloned())
    }

    async fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let mut db = self.db.lock().unwrap();
        let rows = db.tables.get_mut(&self.table).unwrap();
        let mut record = record.clone();
        if let Some(existing) = rows.get(&record.id) {
            record.created = existing.created;
        }
        rows.insert(record.id.clone(), record);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut db = self.db.lock().unwrap();
        db.tables.get_mut(&self.table).unwrap().remove(id);
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        Ok(0)
    }
}

/// Builds stores against [`FakeDatabase`] using the MySQL schema options.
#[derive(Clone)]
struct SchemaConnector {
    db: Arc<Mutex<FakeDatabase>>,
    options: SqlStoreOptions,
}

#[async_trait]
impl Connector for SchemaConnector {
    async fn connect(&self) -> Result<StoreHandle, StoreError> {
        let options = MysqlStore::schema_options(self.options.clone());
        {
            let mut db = self.db.lock().unwrap();
            for stmt in options.ddl_statements() {
                db.execute_ddl(&options.table_name, &stmt)?;
            }
        }
        Ok(Arc::new(FakeTableStore {
            db: self.db.clone(),
            table: options.table_name,
        }))
    }
}

#[tokio::test(start_paused = true)]
async fn constructing_twice_keeps_rows_and_runs_one_ddl_each() {
    init_tracing();
    let db = Arc::new(Mutex::new(FakeDatabase::default()));
    let connector = SchemaConnector {
        db: db.clone(),
        options: SqlStoreOptions {
            table_name: "web_sessions".to_string(),
            ..SqlStoreOptions::default()
        },
    };

    let first = ResilientInitializer::new(connector.clone(), 1, fallback_in("ddl-first"))
        .acquire()
        .await
        .expect("first construction failed");
    assert_eq!(db.lock().unwrap().ddl_calls, 1);

    let record = SessionRecord::new(b"kept".to_vec(), Duration::from_secs(3600));
    first.save(&record).await.unwrap();

    let second = ResilientInitializer::new(connector, 1, fallback_in("ddl-second"))
        .acquire()
        .await
        .expect("second construction failed");
    assert_eq!(second.backend(), "db");
    assert_eq!(db.lock().unwrap().ddl_calls, 2);

    let loaded = second.load(&record.id).await.unwrap().expect("row lost");
    assert_eq!(loaded.data, b"kept");
    assert_eq!(db.lock().unwrap().tables["web_sessions"].len(), 1);
}

#[tokio::test(start_paused = true)]
async fn reachable_database_is_used_on_first_attempt() {
    init_tracing();
    let connector = ScriptedConnector::failing(0);
    let init = ResilientInitializer::new(connector.clone(), 5, fallback_in("reachable"));

    let start = Instant::now();
    let store = init.acquire().await.expect("acquire failed");

    assert_eq!(store.backend(), "db");
    assert_eq!(connector.attempts(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn unset_bound_defaults_to_five_attempts_then_falls_back() {
    init_tracing();
    let connector = ScriptedConnector::always_failing();
    let fallback = fallback_in("default-bound");
    let dir = fallback.save_path.clone().unwrap();
    let init = ResilientInitializer::new(connector.clone(), 0, fallback);
    assert_eq!(init.attempts(), 5);

    let start = Instant::now();
    let store = init.acquire().await.expect("fallback should not fail");

    assert_eq!(store.backend(), "filesystem");
    assert_eq!(connector.attempts(), 5);
    // four one-second sleeps between five attempts
    assert_eq!(start.elapsed(), Duration::from_secs(4));
    assert!(dir.is_dir());

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test(start_paused = true)]
async fn single_attempt_bound_never_sleeps() {
    init_tracing();
    let connector = ScriptedConnector::always_failing();
    let fallback = fallback_in("single");
    let dir = fallback.save_path.clone().unwrap();
    let init = ResilientInitializer::new(connector.clone(), 1, fallback);

    let start = Instant::now();
    let store = init.acquire().await.expect("fallback should not fail");

    assert_eq!(store.backend(), "filesystem");
    assert_eq!(connector.attempts(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test(start_paused = true)]
async fn recovers_on_third_attempt() {
    init_tracing();
    let connector = ScriptedConnector::failing(2);
    let init = ResilientInitializer::new(connector.clone(), 3, fallback_in("recover"));

    let start = Instant::now();
    let store = init.acquire().await.expect("acquire failed");

    assert_eq!(store.backend(), "db");
    assert_eq!(connector.attempts(), 3);
    assert_eq!(start.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn success_stops_further_attempts() {
    init_tracing();
    let connector = ScriptedConnector::failing(1);
    let init = ResilientInitializer::new(connector.clone(), 10, fallback_in("stop"));

    let start = Instant::now();
    let store = init.acquire().await.expect("acquire failed");

    assert_eq!(store.backend(), "db");
    assert_eq!(connector.attempts(), 2);
    assert_eq!(start.elapsed(), Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn backoff_policy_is_pluggable() {
    init_tracing();
    let connector = ScriptedConnector::failing(3);
    let init = ResilientInitializer::new(connector.clone(), 4, fallback_in("exponential"))
        .with_backoff(ExponentialBackoff {
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: false,
        });

    let start = Instant::now();
    let store = init.acquire().await.expect("acquire failed");

    assert_eq!(store.backend(), "db");
    assert_eq!(connector.attempts(), 4);
    assert_eq!(start.elapsed(), Duration::from_secs(1 + 2 + 4));
}

#[tokio::test(start_paused = true)]
async fn custom_fixed_delay_is_honoured() {
    init_tracing();
    let connector = ScriptedConnector::failing(2);
    let init = ResilientInitializer::new(connector.clone(), 5, fallback_in("fixed"))
        .with_backoff(FixedBackoff::new(Duration::from_millis(250)));

    let start = Instant::now();
    init.acquire().await.expect("acquire failed");

    assert_eq!(connector.attempts(), 3);
    assert_eq!(start.elapsed(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn fallback_failure_is_reported_once_both_backends_fail() {
    init_tracing();
    let blocker = temp_path("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let connector = ScriptedConnector::always_failing();
    let init = ResilientInitializer::new(connector.clone(), 2, FilesystemOptions::default())
        .with_fallback_options(FilesystemOptions {
            save_path: Some(blocker.join("sessions")),
            ..FilesystemOptions::default()
        });

    let err = match init.acquire().await {
        Ok(store) => panic!("expected failure, got {} store", store.backend()),
        Err(e) => e,
    };

    assert!(err.is_unavailable());
    assert_eq!(connector.attempts(), 2);
    if let StoreError::Unavailable { primary, fallback } = err {
        assert!(matches!(*primary, StoreError::Io(_)));
        assert!(matches!(*fallback, StoreError::Io(_)));
    }

    let _ = std::fs::remove_file(&blocker);
}

#[tokio::test(start_paused = true)]
async fn fallback_store_is_usable() {
    init_tracing();
    let fallback = fallback_in("usable");
    let dir = fallback.save_path.clone().unwrap();
    let init = ResilientInitializer::new(ScriptedConnector::always_failing(), 1, fallback);
    let store = init.acquire().await.expect("fallback should not fail");

    let record = SessionRecord::new(b"cart=3".to_vec(), Duration::from_secs(3600));
    store.save(&record).await.unwrap();
    let loaded = store.load(&record.id).await.unwrap().expect("session lost");
    assert_eq!(loaded.data, b"cart=3");

    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn unreachable_mysql_registers_fallback_under_default_name() {
    init_tracing();
    let cfg = Config {
        database: DbConfig {
            port: 9,
            ..DbConfig::default()
        },
        max_reconnect: 1,
        connect_timeout_secs: 1,
        ..Config::default()
    };

    let mut registry = StoreRegistry::new();
    let store = acquire_and_register(&cfg, &mut registry, None)
        .await
        .expect("acquire should degrade, not fail");

    assert_eq!(store.backend(), "filesystem");
    let registered = registry.get("mysql").expect("not registered");
    assert!(Arc::ptr_eq(&registered, &store));
}

#[tokio::test]
async fn register_under_explicit_name() {
    init_tracing();
    let cfg = Config {
        database: DbConfig {
            port: 9,
            ..DbConfig::default()
        },
        max_reconnect: 1,
        connect_timeout_secs: 1,
        ..Config::default()
    };

    let mut registry = StoreRegistry::new();
    acquire_and_register(&cfg, &mut registry, Some("sessions"))
        .await
        .expect("acquire should degrade, not fail");

    assert!(registry.contains("sessions"));
    assert!(!registry.contains("mysql"));
}
