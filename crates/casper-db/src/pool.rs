//! Connection pool creation and configuration.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use thiserror::Error;

/// Runtime tunables for SQLite connection behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    pub pool_max_size: u32,

    /// How long a context waits for a pooled connection, in milliseconds.
    pub acquire_timeout_ms: u64,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
            acquire_timeout_ms: 30_000,
        }
    }
}

/// How connections handed out by a pool may touch the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Every connection runs with `PRAGMA query_only = ON`.
    ReadOnly,
    /// Connections may write; the pool switches the file to WAL mode.
    ReadWrite,
}

/// A type alias for the SQLite connection pool.
pub type DbPool = Pool<SqliteConnectionManager>;

/// Errors that can occur when creating the database pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// Failed to build the connection pool.
    #[error("failed to create database connection pool: {0}")]
    PoolInit(#[from] r2d2::Error),
}

/// Creates a new SQLite connection pool for the given access mode.
///
/// Read-write pools create the file if needed and put it in WAL mode so
/// readers on other connections are never blocked by the single writer.
/// Read-only pools require an existing file, leave the journal mode alone
/// and mark every connection `query_only`, so a statement that would modify
/// the database fails instead of running.
///
/// # Arguments
///
/// * `db_path` - Path to the SQLite database file. `:memory:` works but
///   gives every pooled connection its own private database, so read and
///   write pools over `:memory:` never see each other.
///
/// # Errors
///
/// Returns `PoolError::PoolInit` if the connection pool cannot be created.
pub fn create_pool(
    db_path: &str,
    mode: AccessMode,
    settings: DbRuntimeSettings,
) -> Result<DbPool, PoolError> {
    // A read store must already exist; only the write pool may create one.
    let flags = match mode {
        AccessMode::ReadOnly => {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_FULL_MUTEX
        }
        AccessMode::ReadWrite => {
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX
        }
    };

    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(flags)
        .with_init(move |conn| {
            conn.execute_batch(&format!(
                "PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = {};",
                settings.busy_timeout_ms
            ))?;

            match mode {
                AccessMode::ReadOnly => conn.execute_batch("PRAGMA query_only = ON;"),
                AccessMode::ReadWrite => {
                    // In-memory databases report "memory", which is expected.
                    let journal_mode: String =
                        conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
                    if journal_mode != "wal" && journal_mode != "memory" {
                        return Err(rusqlite::Error::SqliteFailure(
                            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                            Some(format!(
                                "failed to set WAL journal mode, got: {}",
                                journal_mode
                            )),
                        ));
                    }
                    Ok(())
                }
            }
        });

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .connection_timeout(Duration::from_millis(settings.acquire_timeout_ms))
        .build(manager)?;

    tracing::debug!(
        path = db_path,
        ?mode,
        max_size = settings.pool_max_size,
        "created database pool"
    );

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_in_memory_write_pool() {
        let settings = DbRuntimeSettings {
            busy_timeout_ms: 2_500,
            pool_max_size: 3,
            acquire_timeout_ms: 1_000,
        };

        let pool = create_pool(":memory:", AccessMode::ReadWrite, settings)
            .expect("pool creation should succeed");
        let conn = pool.get().expect("should get a connection");

        // In-memory databases may report "memory" instead of "wal"
        let mode: String = conn
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .expect("should query journal_mode");
        assert!(
            mode == "wal" || mode == "memory",
            "unexpected journal_mode: {mode}"
        );

        let fk: i32 = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .expect("should query foreign_keys");
        assert_eq!(fk, 1, "foreign keys should be enabled");

        let busy_timeout: i32 = conn
            .query_row("PRAGMA busy_timeout;", [], |row| row.get(0))
            .expect("should query busy_timeout");
        assert_eq!(busy_timeout, 2_500, "busy timeout should match settings");

        let query_only: i32 = conn
            .query_row("PRAGMA query_only;", [], |row| row.get(0))
            .expect("should query query_only");
        assert_eq!(query_only, 0);

        assert_eq!(pool.max_size(), 3, "pool max size should match settings");
    }

    #[test]
    fn read_only_pool_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let path = path.to_str().unwrap();
        create_pool(path, AccessMode::ReadWrite, DbRuntimeSettings::default())
            .expect("write pool creates the file");

        let pool = create_pool(path, AccessMode::ReadOnly, DbRuntimeSettings::default())
            .expect("pool creation should succeed");
        let conn = pool.get().expect("should get a connection");

        let query_only: i32 = conn
            .query_row("PRAGMA query_only;", [], |row| row.get(0))
            .expect("should query query_only");
        assert_eq!(query_only, 1);

        let err = conn
            .execute_batch("CREATE TABLE t (id INTEGER PRIMARY KEY);")
            .expect_err("writes must be rejected");
        assert!(
            err.to_string().to_lowercase().contains("readonly")
                || err.to_string().to_lowercase().contains("read-only")
                || err.to_string().to_lowercase().contains("query_only"),
            "unexpected error: {err}"
        );
    }

    #[test]
    fn read_only_pool_does_not_create_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("typo.db");
        let settings = DbRuntimeSettings {
            pool_max_size: 1,
            acquire_timeout_ms: 200,
            ..DbRuntimeSettings::default()
        };

        let res = create_pool(path.to_str().unwrap(), AccessMode::ReadOnly, settings);
        assert!(matches!(res, Err(PoolError::PoolInit(_))));
        assert!(!path.exists(), "read-only pool must not create the file");
    }
}
