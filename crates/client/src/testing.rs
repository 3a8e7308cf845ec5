//! Scripted transport for worker tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mentepyme_core::{Error, Request, Response};
use tokio::sync::Notify;

use crate::fetch::Transport;

/// Serves canned responses by URL and records every call it receives.
///
/// Unknown URLs answer 404, like a static file server would. When offline,
/// every call fails with a network error (and is still recorded). A gated
/// URL holds its answer until the gate is notified.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<HashMap<String, Response>>,
    rejected: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(&self, url: &str, status: u16, body: &'static str) {
        let response = Response::new(url, status, body).with_header("content-type", "text/plain");
        self.routes.lock().unwrap().insert(url.to_string(), response);
    }

    /// Fail calls for `url` with a non-network error.
    pub(crate) fn reject(&self, url: &str) {
        self.rejected.lock().unwrap().insert(url.to_string());
    }

    /// Hold calls for `url` until the returned gate is notified.
    pub(crate) fn gate(&self, url: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(url.to_string(), Arc::clone(&gate));
        gate
    }

    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of network calls made for `url`, any method.
    pub(crate) fn calls_for(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.split_once(' ').is_some_and(|(_, u)| u == url))
            .count()
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let url = request.url().to_string();
        self.calls
            .lock()
            .unwrap()
            .push(format!("{} {}", request.method(), url));

        let gate = self.gates.lock().unwrap().get(&url).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("offline: {url}")));
        }
        if self.rejected.lock().unwrap().contains(&url) {
            return Err(Error::InvalidInput(format!("rejected: {url}")));
        }

        let routes = self.routes.lock().unwrap();
        Ok(routes
            .get(&url)
            .cloned()
            .unwrap_or_else(|| Response::new(url, 404, "not found")))
    }
}
