//! Client code for mentepyme.
//!
//! This crate provides the network transport and the offline service worker
//! that sits in front of it, shared by the CLI and any embedding host.

pub mod fetch;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use fetch::{FetchClient, FetchConfig, Transport};
pub use worker::{Controller, Intercept, Registration, ServiceWorker, Strategy, WorkerConfig};
