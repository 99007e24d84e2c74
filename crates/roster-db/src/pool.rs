//! Connection pool and the retrying connection manager.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    pub pool_max_size: u32,

    /// How many times [`Database::acquire`] tries before giving up.
    pub connect_attempts: u32,

    /// Fixed pause between failed attempts, in milliseconds.
    pub retry_delay_ms: u64,

    /// How long one attempt waits for a free pooled connection, in milliseconds.
    pub checkout_timeout_ms: u64,
}

impl DbRuntimeSettings {
    /// Longest time [`Database::acquire`] spends waiting before it reports
    /// failure: every attempt's checkout wait plus the pauses between them.
    pub fn worst_case_acquire(&self) -> Duration {
        let attempts = self.connect_attempts;
        Duration::from_millis(self.checkout_timeout_ms) * attempts
            + Duration::from_millis(self.retry_delay_ms) * attempts.saturating_sub(1)
    }
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
            connect_attempts: 5,
            retry_delay_ms: 2_000,
            checkout_timeout_ms: 250,
        }
    }
}

type SqlitePool = Pool<SqliteConnectionManager>;

/// A checked-out connection. Dropping it returns the connection to the pool.
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Errors that can occur when creating the database pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The runtime settings cannot describe a usable pool.
    #[error("invalid database settings: {0}")]
    InvalidSettings(&'static str),
}

/// Why a single connection attempt failed.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The database file could not be opened or configured.
    #[error("{0}")]
    Open(#[from] rusqlite::Error),

    /// The pool had no free connection within the checkout wait.
    #[error("{0}")]
    Checkout(#[from] r2d2::Error),
}

/// Errors returned by [`Database::acquire`].
#[derive(Debug, Error)]
pub enum AcquireError {
    /// Every attempt failed; carries the cause reported by the last one.
    #[error("database connection failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        source: ConnectError,
    },
}

/// Routes pool-level connection errors into `tracing`.
#[derive(Debug)]
struct TracingErrorHandler;

impl r2d2::HandleError<rusqlite::Error> for TracingErrorHandler {
    fn handle_error(&self, error: rusqlite::Error) {
        tracing::warn!(error = %error, "failed to open sqlite connection");
    }
}

fn open_flags() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX
}

/// Puts a fresh connection into WAL mode with foreign keys and the busy timeout.
fn init_connection(conn: &mut Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    // In-memory databases report "memory", which is acceptable.
    let journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    if journal_mode != "wal" && journal_mode != "memory" {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!(
                "failed to set WAL journal mode, got: {}",
                journal_mode
            )),
        ));
    }
    conn.execute_batch(&format!(
        "PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = {};",
        busy_timeout_ms
    ))
}

/// The connection manager: a bounded pool plus the acquire retry policy.
///
/// The pool only exists while the database is reachable. It is created by
/// the first attempt whose direct open succeeds and discarded when
/// [`acquire`](Self::acquire) gives up, so nothing reconnects in the
/// background between requests.
///
/// Cloning is cheap and shares the underlying pool.
#[derive(Clone)]
pub struct Database {
    path: Arc<str>,
    settings: DbRuntimeSettings,
    slot: Arc<Mutex<Option<SqlitePool>>>,
}

impl Database {
    /// Prepares the connection manager for the SQLite database at `db_path`.
    ///
    /// Nothing is opened here; the first [`acquire`](Self::acquire) does
    /// that.
    ///
    /// # Errors
    ///
    /// Returns `PoolError::InvalidSettings` if a size, attempt count or
    /// timeout is zero.
    pub fn open(db_path: &str, settings: DbRuntimeSettings) -> Result<Self, PoolError> {
        if settings.pool_max_size == 0 {
            return Err(PoolError::InvalidSettings("pool_max_size must be positive"));
        }
        if settings.connect_attempts == 0 {
            return Err(PoolError::InvalidSettings("connect_attempts must be positive"));
        }
        if settings.checkout_timeout_ms == 0 {
            return Err(PoolError::InvalidSettings("checkout_timeout_ms must be positive"));
        }

        Ok(Self {
            path: Arc::from(db_path),
            settings,
            slot: Arc::new(Mutex::new(None)),
        })
    }

    /// Checks out a connection, retrying with a fixed delay.
    ///
    /// Makes up to `connect_attempts` attempts. An attempt opens the
    /// database directly when no pool is established yet, then waits at
    /// most `checkout_timeout_ms` for a pooled connection. Failed attempts
    /// are separated by `retry_delay_ms`. This blocks the calling thread;
    /// async callers should run it on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns `AcquireError::Exhausted` with the last attempt's error once
    /// all attempts have failed. The pool is dropped at that point.
    pub fn acquire(&self) -> Result<DbConn, AcquireError> {
        let attempts = self.settings.connect_attempts;
        let delay = Duration::from_millis(self.settings.retry_delay_ms);

        let mut attempt = 1;
        loop {
            match self.try_acquire() {
                Ok(conn) => return Ok(conn),
                Err(source) if attempt >= attempts => {
                    tracing::error!(attempts, error = %source, "giving up on database connection");
                    self.discard_pool();
                    return Err(AcquireError::Exhausted { attempts, source });
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "database connection attempt failed, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    fn try_acquire(&self) -> Result<DbConn, ConnectError> {
        let pool = {
            let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
            match slot.as_ref() {
                Some(pool) => pool.clone(),
                None => {
                    let pool = self.establish()?;
                    *slot = Some(pool.clone());
                    pool
                }
            }
        };
        let checkout = Duration::from_millis(self.settings.checkout_timeout_ms);
        Ok(pool.get_timeout(checkout)?)
    }

    /// Opens and configures one connection by hand, then builds the pool.
    fn establish(&self) -> Result<SqlitePool, ConnectError> {
        let busy_timeout_ms = self.settings.busy_timeout_ms;

        let mut first = Connection::open_with_flags(&*self.path, open_flags())?;
        init_connection(&mut first, busy_timeout_ms)?;
        drop(first);

        let manager = SqliteConnectionManager::file(&*self.path)
            .with_flags(open_flags())
            .with_init(move |conn| init_connection(conn, busy_timeout_ms));

        let pool = Pool::builder()
            .max_size(self.settings.pool_max_size)
            .min_idle(Some(0))
            .connection_timeout(Duration::from_millis(self.settings.checkout_timeout_ms))
            .error_handler(Box::new(TracingErrorHandler))
            .build(manager)?;

        tracing::debug!(path = %self.path, "database pool established");
        Ok(pool)
    }

    fn discard_pool(&self) {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if slot.take().is_some() {
            tracing::debug!(path = %self.path, "database pool discarded");
        }
    }

    /// The settings this manager was built with.
    pub fn settings(&self) -> DbRuntimeSettings {
        self.settings
    }

    /// Current pool occupancy, or `None` while no pool is established.
    pub fn pool_state(&self) -> Option<r2d2::State> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().map(|pool| pool.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Default policy with every delay divided by 20.
    fn fast_settings() -> DbRuntimeSettings {
        let defaults = DbRuntimeSettings::default();
        DbRuntimeSettings {
            retry_delay_ms: defaults.retry_delay_ms / 20,
            checkout_timeout_ms: defaults.checkout_timeout_ms / 20,
            ..defaults
        }
    }

    #[test]
    fn default_policy_gives_up_within_ten_seconds() {
        let settings = DbRuntimeSettings::default();
        assert_eq!(settings.connect_attempts, 5);
        assert_eq!(settings.retry_delay_ms, 2_000);
        assert!(settings.worst_case_acquire() <= Duration::from_secs(10));
    }

    #[test]
    fn acquire_opens_a_working_connection() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("roster.db");
        let db = Database::open(path.to_str().unwrap(), fast_settings()).unwrap();
        assert!(db.pool_state().is_none(), "open should not connect");

        let conn = db.acquire().expect("acquire should succeed");
        let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(one, 1);

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode, "wal");

        let foreign_keys: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn dropped_connection_returns_to_pool() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("roster.db");
        let settings = DbRuntimeSettings {
            pool_max_size: 1,
            ..fast_settings()
        };
        let db = Database::open(path.to_str().unwrap(), settings).unwrap();

        for _ in 0..5 {
            let conn = db.acquire().expect("single-slot pool should be reusable");
            drop(conn);
        }
        let state = db.pool_state().expect("pool should be established");
        assert_eq!(state.connections, 1);
        assert_eq!(state.idle_connections, 1);
    }

    #[test]
    fn acquire_gives_up_after_bounded_attempts() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("missing").join("nested").join("roster.db");
        let settings = fast_settings();
        let db = Database::open(path.to_str().unwrap(), settings).unwrap();

        let started = Instant::now();
        let err = db.acquire().expect_err("unreachable database should fail");
        let elapsed = started.elapsed();

        match &err {
            AcquireError::Exhausted { attempts, source } => {
                assert_eq!(*attempts, settings.connect_attempts);
                assert!(matches!(source, ConnectError::Open(_)));
            }
        }
        assert!(!err.to_string().is_empty());

        let pauses = Duration::from_millis(settings.retry_delay_ms)
            * (settings.connect_attempts - 1);
        assert!(elapsed >= pauses, "should have waited between attempts");
        assert!(
            elapsed <= settings.worst_case_acquire() + Duration::from_secs(1),
            "took {elapsed:?}"
        );
    }

    #[test]
    fn nothing_connects_after_acquire_gives_up() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let parent = dir.path().join("later");
        let path = parent.join("roster.db");
        let db = Database::open(path.to_str().unwrap(), fast_settings()).unwrap();

        db.acquire().expect_err("directory does not exist yet");

        // Make the database reachable and give any stray reconnect time to run.
        std::fs::create_dir_all(&parent).unwrap();
        std::thread::sleep(Duration::from_millis(300));

        assert!(db.pool_state().is_none());
        assert!(!path.exists(), "no connection should have been opened");

        // The next request connects on its own.
        let conn = db.acquire().expect("database is reachable now");
        drop(conn);
        assert!(path.exists());
        assert_eq!(db.pool_state().map(|s| s.connections), Some(1));
    }

    #[test]
    fn exhausted_acquire_discards_established_pool() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let path = dir.path().join("roster.db");
        let settings = DbRuntimeSettings {
            pool_max_size: 1,
            connect_attempts: 2,
            ..fast_settings()
        };
        let db = Database::open(path.to_str().unwrap(), settings).unwrap();

        let held = db.acquire().expect("first checkout should succeed");
        let err = db.acquire().expect_err("single-slot pool is busy");
        assert!(matches!(
            err,
            AcquireError::Exhausted {
                source: ConnectError::Checkout(_),
                ..
            }
        ));
        assert!(db.pool_state().is_none());

        drop(held);
        db.acquire().expect("a fresh pool should be built");
    }

    #[test]
    fn open_rejects_zero_settings() {
        let zero_pool = DbRuntimeSettings {
            pool_max_size: 0,
            ..DbRuntimeSettings::default()
        };
        assert!(matches!(
            Database::open("unused.db", zero_pool),
            Err(PoolError::InvalidSettings(_))
        ));

        let zero_attempts = DbRuntimeSettings {
            connect_attempts: 0,
            ..DbRuntimeSettings::default()
        };
        assert!(matches!(
            Database::open("unused.db", zero_attempts),
            Err(PoolError::InvalidSettings(_))
        ));

        let zero_checkout = DbRuntimeSettings {
            checkout_timeout_ms: 0,
            ..DbRuntimeSettings::default()
        };
        assert!(matches!(
            Database::open("unused.db", zero_checkout),
            Err(PoolError::InvalidSettings(_))
        ));
    }
}
