//! SQLite pool for form definitions and conversation sessions.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::time::Duration;
use thiserror::Error;

/// Pool size and lock-wait tunables, usually taken from `[database]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbRuntimeSettings {
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Upper bound on open connections. Must be non-zero.
    pub pool_max_size: u32,
}

impl Default for DbRuntimeSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            pool_max_size: 8,
        }
    }
}

impl DbRuntimeSettings {
    fn check(&self) -> Result<(), PoolError> {
        if self.pool_max_size == 0 {
            return Err(PoolError::InvalidSettings(
                "pool_max_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

pub type DbPool = Pool<SqliteConnectionManager>;

pub type DbConn = PooledConnection<SqliteConnectionManager>;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid database settings: {0}")]
    InvalidSettings(String),

    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

/// Session settings applied to every connection the pool opens: WAL with
/// `synchronous = NORMAL`, foreign keys on, and the configured busy timeout.
fn prepare_connection(conn: &mut Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    // `:memory:` databases stay in memory mode.
    if !mode.eq_ignore_ascii_case("wal") && !mode.eq_ignore_ascii_case("memory") {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("journal_mode stayed {mode}, expected wal")),
        ));
    }
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(busy_timeout)
}

/// Opens (creating if needed) the database at `db_path` behind a bounded pool.
///
/// With `:memory:` each pooled connection sees its own empty database; use a
/// temporary file when several connections must share rows.
pub fn create_pool(db_path: &str, settings: DbRuntimeSettings) -> Result<DbPool, PoolError> {
    settings.check()?;

    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| prepare_connection(conn, busy_timeout));

    let pool = Pool::builder()
        .max_size(settings.pool_max_size)
        .build(manager)?;

    tracing::debug!(
        path = db_path,
        max_connections = settings.pool_max_size,
        busy_timeout_ms = settings.busy_timeout_ms,
        "sqlite pool ready"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pragma_i64(conn: &Connection, name: &str) -> i64 {
        conn.query_row(&format!("PRAGMA {name};"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn connections_get_session_pragmas() {
        let pool = create_pool(
            ":memory:",
            DbRuntimeSettings {
                busy_timeout_ms: 1_500,
                pool_max_size: 2,
            },
        )
        .unwrap();
        let conn = pool.get().unwrap();

        assert_eq!(pragma_i64(&conn, "foreign_keys"), 1);
        assert_eq!(pragma_i64(&conn, "busy_timeout"), 1_500);
        // NORMAL
        assert_eq!(pragma_i64(&conn, "synchronous"), 1);
        assert_eq!(pool.max_size(), 2);
    }

    #[test]
    fn file_database_runs_in_wal_mode() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let pool = create_pool(file.path().to_str().unwrap(), DbRuntimeSettings::default())
            .unwrap();
        let mode: String = pool
            .get()
            .unwrap()
            .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn zero_sized_pool_is_refused() {
        let settings = DbRuntimeSettings {
            pool_max_size: 0,
            ..DbRuntimeSettings::default()
        };
        assert!(matches!(
            create_pool(":memory:", settings),
            Err(PoolError::InvalidSettings(_))
        ));
    }

    #[test]
    fn pooled_connections_share_a_file_database() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let pool = create_pool(file.path().to_str().unwrap(), DbRuntimeSettings::default())
            .unwrap();

        let writer = pool.get().unwrap();
        let reader = pool.get().unwrap();
        writer
            .execute_batch("CREATE TABLE turns (id INTEGER PRIMARY KEY); INSERT INTO turns DEFAULT VALUES;")
            .unwrap();
        let count: i64 = reader
            .query_row("SELECT COUNT(*) FROM turns", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
