//! Cache generation operations: open, enumerate and delete whole caches.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Per-cache totals for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSummary {
    pub name: String,
    pub created_at: String,
    pub entries: u64,
    pub bytes: u64,
}

/// Insert the cache row if missing. Returns true when it was created.
pub(crate) fn ensure_cache(conn: &rusqlite::Connection, name: &str) -> Result<bool, rusqlite::Error> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO caches (name, created_at) VALUES (?1, ?2)",
        params![name, chrono::Utc::now().to_rfc3339()],
    )?;
    Ok(inserted == 1)
}

impl CacheDb {
    /// Open the named cache, creating it if absent.
    ///
    /// Returns true when this call created the cache.
    pub async fn open_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> { Ok(ensure_cache(conn, &name)?) })
            .await
            .map_err(Error::from)
    }

    /// Check whether a cache with this name exists.
    pub async fn has_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM caches WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// List every cache name in creation order.
    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM caches ORDER BY rowid")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a cache and all of its entries.
    ///
    /// Returns false if no cache had that name.
    pub async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM caches WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Entry counts and body sizes for every cache, in creation order.
    pub async fn cache_summaries(&self) -> Result<Vec<CacheSummary>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<CacheSummary>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT c.name, c.created_at, COUNT(e.key_hash), COALESCE(SUM(LENGTH(e.body)), 0)
                     FROM caches c LEFT JOIN entries e ON e.cache_name = c.name
                     GROUP BY c.name
                     ORDER BY c.rowid",
                )?;
                let summaries = stmt
                    .query_map([], |row| {
                        Ok(CacheSummary {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            entries: row.get::<_, i64>(2)? as u64,
                            bytes: row.get::<_, i64>(3)? as u64,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(summaries)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_cache_creates_once() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.open_cache("mentepy-cache-v1").await.unwrap());
        assert!(!db.open_cache("mentepy-cache-v1").await.unwrap());
        assert!(db.has_cache("mentepy-cache-v1").await.unwrap());
        assert!(!db.has_cache("mentepy-cache-v2").await.unwrap());
    }

    #[tokio::test]
    async fn test_cache_names_in_creation_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_cache("b").await.unwrap();
        db.open_cache("a").await.unwrap();
        db.open_cache("c").await.unwrap();

        let names = db.cache_names().await.unwrap();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_delete_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_cache("old").await.unwrap();
        db.open_cache("new").await.unwrap();

        assert!(db.delete_cache("old").await.unwrap());
        assert!(!db.delete_cache("old").await.unwrap());
        assert_eq!(db.cache_names().await.unwrap(), vec!["new"]);
    }

    #[tokio::test]
    async fn test_summaries_for_empty_cache() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_cache("empty").await.unwrap();

        let summaries = db.cache_summaries().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "empty");
        assert_eq!(summaries[0].entries, 0);
        assert_eq!(summaries[0].bytes, 0);
    }
}
