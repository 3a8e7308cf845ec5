//! Opening the cache database.

use std::path::Path;
use std::time::Duration;

use tokio_rusqlite::Connection;

use super::migrations;
use crate::Error;

/// How long a write waits on a lock held by another process (a second CLI
/// invocation, say) before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the persistent cache store.
///
/// Cloning is cheap and every clone talks to the same background thread, so
/// statements from concurrent fetches are serialized. A single put or match
/// is therefore atomic per key.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open (or create) the database file at `path` and bring its schema up
    /// to date.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        tracing::debug!(path = %path.display(), "opened cache database");
        Self::init(conn).await
    }

    /// Fresh in-memory store; nothing survives the handle.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            // In-memory databases answer "memory" here; that's fine.
            let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            tracing::trace!(%mode, "journal mode");
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", true)?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pragma(db: &CacheDb, name: &'static str) -> i64 {
        db.conn
            .call(move |conn| conn.query_row(&format!("PRAGMA {name}"), [], |row| row.get(0)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert_eq!(pragma(&db, "foreign_keys").await, 1);
    }

    #[tokio::test]
    async fn test_busy_timeout_applied() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert_eq!(pragma(&db, "busy_timeout").await, 5000);
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let other = db.clone();
        db.open_cache("mentepy-cache-v1").await.unwrap();
        assert!(other.has_cache("mentepy-cache-v1").await.unwrap());
    }
}
