//! SQLite-backed cache storage for offline request interception.
//!
//! This module provides named, versioned caches ("generations") using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - Request-keyed entries hashed with SHA-256 over method and URL
//! - Open/list/delete of whole cache generations
//! - Persisted lifecycle state per generation
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::StoredEntry;
pub use generations::{Generation, GenerationState};
pub use storage::CacheSummary;
