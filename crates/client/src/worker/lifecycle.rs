//! Generation lifecycle: the host side of the service worker.
//!
//! Each hook runs as its own tokio task and the controller awaits it before
//! moving the generation to its next state:
//!
//! `installing → installed → activating → active`, with the superseded
//! generation (and any failed install) ending up `redundant`.

use std::sync::Arc;

use mentepyme_core::{CacheDb, Error, GenerationState, Request, Response};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::config::WorkerConfig;
use super::service_worker::{Intercept, ServiceWorker};
use crate::fetch::Transport;

/// Result of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub cache_name: String,
    /// Number of static assets stored by install.
    pub installed: usize,
    /// Stale cache generations removed by activate.
    pub deleted: Vec<String>,
}

/// Await a lifecycle task, surfacing panics and aborts as errors.
async fn join<R>(task: JoinHandle<Result<R, Error>>) -> Result<R, Error> {
    task.await.map_err(|e| Error::Lifecycle(e.to_string()))?
}

/// Drives registrations and routes fetches to the active worker.
pub struct Controller {
    db: CacheDb,
    transport: Arc<dyn Transport>,
    active: RwLock<Option<Arc<ServiceWorker>>>,
}

impl Controller {
    pub fn new(db: CacheDb, transport: Arc<dyn Transport>) -> Self {
        Self { db, transport, active: RwLock::new(None) }
    }

    pub fn db(&self) -> &CacheDb {
        &self.db
    }

    /// Re-attach a generation that a previous process already activated.
    ///
    /// Returns false, leaving the current worker in place, when storage
    /// doesn't show `config`'s generation as active with its cache present.
    pub async fn resume(&self, config: WorkerConfig) -> Result<bool, Error> {
        let name = config.cache_name().to_string();
        let state = self.db.generation_state(&name).await?;
        if !state.is_some_and(|s| s.serves_fetches()) || !self.db.has_cache(&name).await? {
            tracing::debug!(cache = %name, ?state, "nothing to resume");
            return Ok(false);
        }

        let worker = Arc::new(ServiceWorker::new(self.db.clone(), Arc::clone(&self.transport), config));
        *self.active.write().await = Some(worker);
        tracing::info!(cache = %name, "resumed active generation");
        Ok(true)
    }

    /// Install and activate a generation.
    ///
    /// On install or activate failure the generation is marked redundant
    /// (unless it was already the active one being refreshed) and whatever
    /// was active keeps serving. On success every other generation is purged and this one
    /// becomes active.
    pub async fn register(&self, config: WorkerConfig) -> Result<Registration, Error> {
        let worker = Arc::new(ServiceWorker::new(self.db.clone(), Arc::clone(&self.transport), config));
        let name = worker.cache_name().to_string();
        let refreshing = self.db.generation_state(&name).await? == Some(GenerationState::Active);

        if !refreshing {
            self.db.set_generation_state(&name, GenerationState::Installing).await?;
        }
        tracing::info!(cache = %name, refreshing, "installing");

        let task = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.install().await })
        };
        let installed = match join(task).await {
            Ok(n) => n,
            Err(e) => {
                self.abandon(&name, refreshing, "install", &e).await?;
                return Err(e);
            }
        };

        if !refreshing {
            self.db.set_generation_state(&name, GenerationState::Installed).await?;
            self.db.set_generation_state(&name, GenerationState::Activating).await?;
        }
        tracing::info!(cache = %name, "activating");

        let task = {
            let worker = Arc::clone(&worker);
            tokio::spawn(async move { worker.activate().await })
        };
        let deleted = match join(task).await {
            Ok(deleted) => deleted,
            Err(e) => {
                self.abandon(&name, refreshing, "activate", &e).await?;
                return Err(e);
            }
        };

        for stale in &deleted {
            self.db.set_generation_state(stale, GenerationState::Redundant).await?;
        }
        self.db.set_generation_state(&name, GenerationState::Active).await?;
        *self.active.write().await = Some(worker);

        tracing::info!(cache = %name, installed, deleted = deleted.len(), "generation active");
        Ok(Registration { cache_name: name, installed, deleted })
    }

    /// Give up on a generation whose install or activate failed.
    ///
    /// A new generation is marked redundant and its cache dropped; an active
    /// generation that was only being refreshed is left as it was.
    async fn abandon(&self, name: &str, refreshing: bool, phase: &'static str, err: &Error) -> Result<(), Error> {
        tracing::warn!(cache = %name, phase, error = %err, "registration failed");
        if refreshing {
            return Ok(());
        }
        self.db.set_generation_state(name, GenerationState::Redundant).await?;
        if self.db.delete_cache(name).await? {
            tracing::debug!(cache = %name, "dropped cache of abandoned generation");
        }
        Ok(())
    }

    /// Re-attach whichever generation storage says is serving.
    ///
    /// Prefers `config`'s own generation. When that one isn't active (its
    /// install failed, or it never ran) the last generation that did activate
    /// keeps serving, with `config`'s origin and manifest. Returns the name
    /// of the resumed generation.
    pub async fn resume_active(&self, config: WorkerConfig) -> Result<Option<String>, Error> {
        let configured = config.cache_name().to_string();
        let origin = config.origin().clone();
        let assets = config.static_assets().to_vec();
        if self.resume(config).await? {
            return Ok(Some(configured));
        }

        let Some(active) = self.db.active_generation().await? else {
            return Ok(None);
        };
        if active == configured {
            return Ok(None);
        }

        tracing::info!(configured = %configured, active = %active, "configured generation not active, falling back");
        let resumed = self.resume(WorkerConfig::new(active.clone(), origin, assets)).await?;
        Ok(resumed.then_some(active))
    }

    /// Name of the generation currently answering fetches.
    pub async fn active_cache_name(&self) -> Option<String> {
        self.active.read().await.as_ref().map(|w| w.cache_name().to_string())
    }

    /// Persisted state of a generation.
    pub async fn state(&self, name: &str) -> Result<Option<GenerationState>, Error> {
        self.db.generation_state(name).await
    }

    /// Issue a request the way the app would: through the active worker if
    /// there is one and it takes the request, straight to the network
    /// otherwise.
    pub async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let worker = self.active.read().await.clone();

        if let Some(worker) = worker
            && let Intercept::Handled(result) = worker.handle_fetch(request).await
        {
            return result;
        }

        self.transport.fetch(request).await
    }
}
