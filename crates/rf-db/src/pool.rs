//! SQLite connection pooling.
//!
//! All persistence goes through an r2d2 pool of rusqlite connections. The
//! file-backed pool runs in WAL mode with a busy timeout, so tracker
//! transitions and checkpoint restores issued from different pooled
//! connections queue behind each other instead of failing. The in-memory
//! variant exists for tests and gives every caller an isolated database.

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rf_core::{Error, Result};

use crate::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Connections held per pool. A single driver mutates a project at a time;
/// the remaining connections serve reads and checkpoint captures.
const POOL_SIZE: u32 = 4;

/// Open a file-backed pool at `db_path`, creating the database file if
/// needed and bringing the schema up to date.
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
    });
    build(manager)
}

/// Open a private in-memory pool, migrated and ready.
///
/// The URI carries a process-unique database name with shared cache: the
/// connections of one pool all see the same data, while separate pools
/// (parallel tests) never observe each other.
pub fn init_memory_pool() -> Result<DbPool> {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT_DB: AtomicU64 = AtomicU64::new(0);

    let uri = format!(
        "file:rfdb{}?mode=memory&cache=shared",
        NEXT_DB.fetch_add(1, Ordering::Relaxed)
    );
    let manager = SqliteConnectionManager::file(uri)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
    build(manager)
}

fn build(manager: SqliteConnectionManager) -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(POOL_SIZE)
        .build(manager)
        .map_err(|e| Error::database(format!("cannot build connection pool: {e}")))?;

    let conn = get_conn(&pool)?;
    migrations::run_migrations(&conn)?;
    Ok(pool)
}

/// Check a connection out of the pool.
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("connection checkout failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn insert_project(conn: &rusqlite::Connection, id: &str) {
        conn.execute(
            "INSERT INTO projects (id, theme, target_length_minutes, status, created_at, updated_at)
             VALUES (?1, 'test', 1.0, 'created', '2026-01-01', '2026-01-01')",
            [id],
        )
        .unwrap();
    }

    #[test]
    fn memory_pools_are_isolated() {
        let a = init_memory_pool().unwrap();
        let b = init_memory_pool().unwrap();

        insert_project(&a.get().unwrap(), "p1");

        let count: i64 = b
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM projects", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn connections_within_a_pool_share_state() {
        let pool = init_memory_pool().unwrap();
        insert_project(&pool.get().unwrap(), "p1");

        let count: i64 = pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM projects", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn schema_is_migrated_on_init() {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        for table in ["projects", "project_steps"] {
            let exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |r| r.get(0),
                )
                .unwrap();
            assert!(exists, "table {table} should exist");
        }
    }

    #[test]
    fn file_pool_runs_wal_with_foreign_keys() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("rf.db");
        let pool = init_pool(path.to_str().unwrap()).unwrap();
        let conn = pool.get().unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |r| r.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |r| r.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }
}
