//! Cache entry operations.
//!
//! Entries map a request (method + URL) to the last response stored for it.
//! Writes are upserts, so concurrent stores for the same request resolve
//! last-write-wins.

use super::connection::CacheDb;
use super::hash::compute_cache_key;
use super::storage::ensure_cache;
use crate::Error;
use crate::http::{Request, Response};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Listing view of a stored entry (body omitted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub key_hash: String,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub body_len: u64,
    pub stored_at: String,
}

/// Column values for one entry, built outside the database thread.
struct EntryRow {
    key_hash: String,
    method: String,
    url: String,
    response_url: String,
    status_code: u16,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
    stored_at: String,
}

impl EntryRow {
    fn new(request: &Request, response: &Response) -> Result<Self, Error> {
        check_cacheable(request, response)?;
        Ok(Self {
            key_hash: compute_cache_key(request.method(), request.url().as_str()),
            method: request.method().to_string(),
            url: request.url().to_string(),
            response_url: response.url.clone(),
            status_code: response.status,
            status_text: response.status_text.clone(),
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.to_vec(),
            stored_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}

/// Reject responses a cache may not hold.
///
/// Partial content and `Vary: *` can never be matched back to a request.
pub fn check_cacheable(request: &Request, response: &Response) -> Result<(), Error> {
    if response.status == 206 {
        return Err(Error::Uncacheable(format!("{}: partial content (206)", request.url())));
    }
    if let Some(vary) = response.header("vary")
        && vary.split(',').any(|v| v.trim() == "*")
    {
        return Err(Error::Uncacheable(format!("{}: Vary: *", request.url())));
    }
    Ok(())
}

/// Upsert one entry into an existing cache. Returns false, writing nothing,
/// when the cache row is gone.
fn upsert(conn: &rusqlite::Connection, cache_name: &str, row: &EntryRow) -> Result<bool, rusqlite::Error> {
    let written = conn.execute(
        "INSERT INTO entries (
            cache_name, key_hash, method, url, response_url,
            status_code, status_text, headers_json, body, stored_at
        )
        SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10
        WHERE EXISTS (SELECT 1 FROM caches WHERE name = ?1)
        ON CONFLICT(cache_name, key_hash) DO UPDATE SET
            method = excluded.method,
            url = excluded.url,
            response_url = excluded.response_url,
            status_code = excluded.status_code,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            cache_name,
            &row.key_hash,
            &row.method,
            &row.url,
            &row.response_url,
            row.status_code,
            &row.status_text,
            &row.headers_json,
            &row.body,
            &row.stored_at,
        ],
    )?;
    Ok(written > 0)
}

impl CacheDb {
    /// Store a response for a request in an existing cache.
    ///
    /// Overwrites any earlier entry for the same method and URL. Never
    /// creates the cache: if it has been deleted (a newer generation purged
    /// it while this store was in flight) nothing is written and false is
    /// returned.
    pub async fn put_entry(&self, cache_name: &str, request: &Request, response: &Response) -> Result<bool, Error> {
        let row = EntryRow::new(request, response)?;
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> { Ok(upsert(conn, &cache_name, &row)?) })
            .await
            .map_err(Error::from)
    }

    /// Store a batch of responses in a single transaction.
    ///
    /// Either every entry is committed or none is; the cache itself is only
    /// created if the whole batch commits.
    pub async fn put_all(&self, cache_name: &str, entries: &[(Request, Response)]) -> Result<usize, Error> {
        let rows = entries
            .iter()
            .map(|(request, response)| EntryRow::new(request, response))
            .collect::<Result<Vec<_>, _>>()?;
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                ensure_cache(&tx, &cache_name)?;
                for row in &rows {
                    upsert(&tx, &cache_name, row)?;
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up the stored response for a request in one cache.
    pub async fn match_entry(&self, cache_name: &str, request: &Request) -> Result<Option<Response>, Error> {
        let key_hash = compute_cache_key(request.method(), request.url().as_str());
        let cache_name = cache_name.to_string();
        let found = self
            .conn
            .call(move |conn| -> Result<Option<(String, u16, String, String, Vec<u8>)>, Error> {
                let result = conn.query_row(
                    "SELECT response_url, status_code, status_text, headers_json, body
                     FROM entries WHERE cache_name = ?1 AND key_hash = ?2",
                    params![cache_name, key_hash],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
                );

                match result {
                    Ok(r) => Ok(Some(r)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        let Some((url, status, status_text, headers_json, body)) = found else {
            return Ok(None);
        };

        let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
        Ok(Some(Response { url, status, status_text, headers, body: body.into() }))
    }

    /// Remove the entry for a request. Returns false if nothing was stored.
    pub async fn delete_entry(&self, cache_name: &str, request: &Request) -> Result<bool, Error> {
        let key_hash = compute_cache_key(request.method(), request.url().as_str());
        let cache_name = cache_name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE cache_name = ?1 AND key_hash = ?2",
                    params![cache_name, key_hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// List the entries of one cache, oldest store first.
    pub async fn list_entries(&self, cache_name: &str) -> Result<Vec<StoredEntry>, Error> {
        let cache_name = cache_name.to_string();
        let rows = self
            .conn
            .call(move |conn| -> Result<Vec<(StoredEntry, String)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key_hash, method, url, status_code, LENGTH(body), stored_at, headers_json
                     FROM entries WHERE cache_name = ?1
                     ORDER BY stored_at ASC, url ASC",
                )?;
                let rows = stmt
                    .query_map(params![cache_name], |row| {
                        Ok((
                            StoredEntry {
                                key_hash: row.get(0)?,
                                method: row.get(1)?,
                                url: row.get(2)?,
                                status_code: row.get(3)?,
                                content_type: None,
                                body_len: row.get::<_, i64>(4)? as u64,
                                stored_at: row.get(5)?,
                            },
                            row.get(6)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(mut entry, headers_json)| -> Result<StoredEntry, Error> {
                let headers: Vec<(String, String)> = serde_json::from_str(&headers_json)?;
                entry.content_type = headers
                    .into_iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
                    .map(|(_, v)| v);
                Ok(entry)
            })
            .collect()
    }
}
