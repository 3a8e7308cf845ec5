//! Schema migrations tracked through SQLite's `user_version`.
//!
//! Each migration runs in its own transaction together with the version
//! bump, so a crash mid-upgrade leaves the schema at the last good version.

use super::Error;
use tokio_rusqlite::{Connection, rusqlite};

/// Ordered schema steps. Position `i` upgrades the schema to version `i + 1`.
const MIGRATIONS: &[&str] = &[
    include_str!("../../migrations/001_cache_storage.sql"),
    include_str!("../../migrations/002_generations.sql"),
];

fn schema_version(conn: &rusqlite::Connection) -> Result<usize, Error> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    usize::try_from(version).map_err(|_| Error::MigrationFailed(format!("negative schema version {version}")))
}

/// Bring the schema up to date.
///
/// A database written by a newer build (version above what this build
/// knows) is refused rather than silently misread.
pub async fn run(conn: &Connection) -> Result<(), Error> {
    conn.call(|conn| -> Result<(), Error> {
        let current = schema_version(conn)?;
        if current > MIGRATIONS.len() {
            return Err(Error::MigrationFailed(format!(
                "database schema v{current} is newer than supported v{}",
                MIGRATIONS.len()
            )));
        }

        for (index, sql) in MIGRATIONS.iter().enumerate().skip(current) {
            let version = index + 1;
            tracing::debug!(version, "applying cache migration");

            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| Error::MigrationFailed(format!("v{version}: {e}")))?;
            tx.pragma_update(None, "user_version", version as i64)?;
            tx.commit()?;
        }

        Ok(())
    })
    .await
    .map_err(Error::from)
}
