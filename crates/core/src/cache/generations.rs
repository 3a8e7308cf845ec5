//! Persisted lifecycle state of cache generations.
//!
//! The cache storage alone can't tell a half-installed generation from a
//! live one, so each transition is recorded here. A generation with no row
//! has never been registered.

use std::fmt;
use std::str::FromStr;

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Lifecycle state of one cache generation.
///
/// `installing → installed → activating → active → redundant`. A failed
/// install goes straight to `redundant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationState {
    Installing,
    Installed,
    Activating,
    Active,
    Redundant,
}

impl GenerationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationState::Installing => "installing",
            GenerationState::Installed => "installed",
            GenerationState::Activating => "activating",
            GenerationState::Active => "active",
            GenerationState::Redundant => "redundant",
        }
    }

    /// Only the active generation may answer fetches.
    pub fn serves_fetches(&self) -> bool {
        matches!(self, GenerationState::Active)
    }
}

impl fmt::Display for GenerationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "installing" => Ok(GenerationState::Installing),
            "installed" => Ok(GenerationState::Installed),
            "activating" => Ok(GenerationState::Activating),
            "active" => Ok(GenerationState::Active),
            "redundant" => Ok(GenerationState::Redundant),
            other => Err(Error::CorruptEntry(format!("unknown generation state: {other}"))),
        }
    }
}

/// A generation row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub name: String,
    pub state: GenerationState,
    pub updated_at: String,
}

impl CacheDb {
    /// Record the lifecycle state of a generation.
    pub async fn set_generation_state(&self, name: &str, state: GenerationState) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO generations (name, state, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(name) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
                    params![name, state.as_str(), chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Current state of a generation, or None if it was never registered.
    pub async fn generation_state(&self, name: &str) -> Result<Option<GenerationState>, Error> {
        let name = name.to_string();
        let state = self
            .conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let result =
                    conn.query_row("SELECT state FROM generations WHERE name = ?1", params![name], |row| row.get(0));
                match result {
                    Ok(s) => Ok(Some(s)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        state.map(|s| s.parse()).transpose()
    }

    /// Every recorded generation, most recently updated first.
    pub async fn generations(&self) -> Result<Vec<Generation>, Error> {
        let rows = self
            .conn
            .call(|conn| -> Result<Vec<(String, String, String)>, Error> {
                let mut stmt =
                    conn.prepare("SELECT name, state, updated_at FROM generations ORDER BY updated_at DESC, name")?;
                let rows = stmt
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)?;

        rows.into_iter()
            .map(|(name, state, updated_at)| -> Result<Generation, Error> {
                Ok(Generation { name, state: state.parse()?, updated_at })
            })
            .collect()
    }

    /// Name of the generation currently marked active, if any.
    pub async fn active_generation(&self) -> Result<Option<String>, Error> {
        self.conn
            .call(|conn| -> Result<Option<String>, Error> {
                let result = conn.query_row(
                    "SELECT name FROM generations WHERE state = 'active' ORDER BY updated_at DESC LIMIT 1",
                    [],
                    |row| row.get(0),
                );
                match result {
                    Ok(name) => Ok(Some(name)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trips_through_str() {
        for state in [
            GenerationState::Installing,
            GenerationState::Installed,
            GenerationState::Activating,
            GenerationState::Active,
            GenerationState::Redundant,
        ] {
            assert_eq!(state.as_str().parse::<GenerationState>().unwrap(), state);
        }
        assert!("deleted".parse::<GenerationState>().is_err());
    }

    #[test]
    fn test_only_active_serves_fetches() {
        assert!(GenerationState::Active.serves_fetches());
        assert!(!GenerationState::Installed.serves_fetches());
        assert!(!GenerationState::Redundant.serves_fetches());
    }

    #[tokio::test]
    async fn test_unregistered_generation_has_no_state() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert_eq!(db.generation_state("mentepy-cache-v1").await.unwrap(), None);
        assert_eq!(db.active_generation().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_generation_state_overwrites() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.set_generation_state("v1", GenerationState::Installing).await.unwrap();
        db.set_generation_state("v1", GenerationState::Active).await.unwrap();

        assert_eq!(db.generation_state("v1").await.unwrap(), Some(GenerationState::Active));
        assert_eq!(db.active_generation().await.unwrap().as_deref(), Some("v1"));

        let all = db.generations().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].state, GenerationState::Active);
    }
}
