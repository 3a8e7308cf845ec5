//! Offline request interception.
//!
//! A [`ServiceWorker`] owns one cache generation and exposes the three
//! lifecycle hooks:
//!
//! - **install**: pre-cache the static asset manifest, all-or-nothing.
//! - **activate**: delete every other cache generation.
//! - **fetch**: serve GET requests cache-first (same-origin manifest assets)
//!   or network-first with cache fallback (everything else).
//!
//! The [`Controller`] plays the host: it runs the hooks as tasks, persists
//! each generation's state and routes requests to whichever worker is active.

pub mod config;
pub mod lifecycle;
pub mod service_worker;
pub mod strategy;

pub use config::WorkerConfig;
pub use lifecycle::{Controller, Registration};
pub use service_worker::{Intercept, ServiceWorker};
pub use strategy::{Strategy, classify};
