//! The request interceptor: install, activate and fetch hooks for one
//! cache generation.

use std::sync::Arc;

use futures_util::future::{join_all, try_join_all};
use mentepyme_core::{CacheDb, Error, Request, Response};

use super::config::WorkerConfig;
use super::strategy::{self, Strategy};
use crate::fetch::Transport;

/// Outcome of offering a request to the worker.
#[derive(Debug)]
pub enum Intercept {
    /// Not handled; the host should use its default network path.
    Declined,
    /// Handled; this is the answer (or the failure) the caller observes.
    Handled(Result<Response, Error>),
}

/// Interceptor bound to a single cache generation.
pub struct ServiceWorker {
    db: CacheDb,
    transport: Arc<dyn Transport>,
    config: WorkerConfig,
}

impl ServiceWorker {
    pub fn new(db: CacheDb, transport: Arc<dyn Transport>, config: WorkerConfig) -> Self {
        Self { db, transport, config }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn cache_name(&self) -> &str {
        self.config.cache_name()
    }

    /// Pre-cache every manifest asset.
    ///
    /// All assets are fetched concurrently, then written in one transaction.
    /// A transport failure or non-2xx status on any asset fails the whole
    /// install and nothing is stored.
    pub async fn install(&self) -> Result<usize, Error> {
        let requests = self
            .config
            .static_assets()
            .iter()
            .map(|path| -> Result<(String, Request), Error> { Ok((path.clone(), self.config.asset_request(path)?)) })
            .collect::<Result<Vec<_>, _>>()?;

        let fetches = requests.into_iter().map(|(path, request)| async move {
            let response = self
                .transport
                .fetch(&request)
                .await
                .map_err(|e| Error::InstallFailed { path: path.clone(), reason: e.to_string() })?;
            if !response.is_ok() {
                let reason = format!("status {}", response.status);
                return Err(Error::InstallFailed { path, reason });
            }
            Ok::<_, Error>((request, response))
        });

        let entries = try_join_all(fetches).await?;
        let stored = self.db.put_all(self.cache_name(), &entries).await?;

        tracing::info!(cache = self.cache_name(), assets = stored, "static assets cached");
        Ok(stored)
    }

    /// Delete every cache generation other than this one.
    ///
    /// Deletions run concurrently and independently; a failure is logged and
    /// the rest still go ahead. Returns the names actually deleted.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        let current = self.cache_name();
        let stale: Vec<String> = self
            .db
            .cache_names()
            .await?
            .into_iter()
            .filter(|name| name != current)
            .collect();

        Ok(purge_stale(stale, |name| {
            let db = self.db.clone();
            async move { db.delete_cache(&name).await }
        })
        .await)
    }

    /// How this worker would serve `request`.
    pub fn classify(&self, request: &Request) -> Strategy {
        strategy::classify(&self.config, request)
    }

    /// Offer a request to the worker.
    pub async fn handle_fetch(&self, request: &Request) -> Intercept {
        let transport = self.transport.as_ref();
        match self.classify(request) {
            Strategy::Passthrough => Intercept::Declined,
            Strategy::CacheFirst => {
                Intercept::Handled(strategy::cache_first(&self.db, transport, self.cache_name(), request).await)
            }
            Strategy::NetworkFirst => {
                Intercept::Handled(strategy::network_first(&self.db, transport, self.cache_name(), request).await)
            }
        }
    }
}

/// Run `delete` for every stale name at once. One failing deletion never
/// stops the others.
async fn purge_stale<F, Fut>(stale: Vec<String>, delete: F) -> Vec<String>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<bool, Error>>,
{
    let results = join_all(stale.iter().cloned().map(&delete)).await;

    let mut deleted = Vec::with_capacity(stale.len());
    for (name, result) in stale.into_iter().zip(results) {
        match result {
            Ok(true) => {
                tracing::info!(cache = %name, "deleted stale cache");
                deleted.push(name);
            }
            Ok(false) => tracing::debug!(cache = %name, "stale cache already gone"),
            Err(e) => tracing::warn!(cache = %name, error = %e, "failed to delete stale cache"),
        }
    }
    deleted
}
