//! Core types and shared functionality for mentepyme.
//!
//! This crate provides:
//! - Cache storage (named cache generations) with SQLite backend
//! - Request/response model shared by the worker and the transport
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;

pub use cache::{CacheDb, CacheSummary, GenerationState, StoredEntry};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Request, Response};
