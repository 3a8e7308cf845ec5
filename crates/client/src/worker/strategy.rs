//! Request classification and the two caching strategies.

use mentepyme_core::{CacheDb, Error, Request, Response};

use super::config::WorkerConfig;
use crate::fetch::Transport;

/// How an intercepted request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Not intercepted; the cache is never read or written.
    Passthrough,
    /// Same-origin manifest asset: cache, then network.
    CacheFirst,
    /// Everything else: network, then cache.
    NetworkFirst,
}

/// Classify a request against the worker configuration.
///
/// Only GET is intercepted. The manifest is matched on the path alone, so a
/// query string doesn't demote a static asset to network-first.
pub fn classify(config: &WorkerConfig, request: &Request) -> Strategy {
    if !request.is_get() {
        return Strategy::Passthrough;
    }
    if config.is_same_origin(request.url()) && config.is_static_asset(request.path()) {
        Strategy::CacheFirst
    } else {
        Strategy::NetworkFirst
    }
}

/// Store a copy of `response`. A failed store never fails the fetch.
///
/// Stores never create the cache, so a worker that was superseded while this
/// request was in flight can't bring its purged generation back.
async fn store(db: &CacheDb, cache_name: &str, request: &Request, response: &Response) {
    match db.put_entry(cache_name, request, response).await {
        Ok(true) => tracing::debug!(cache = cache_name, url = %request.url(), status = response.status, "stored"),
        Ok(false) => tracing::debug!(cache = cache_name, url = %request.url(), "cache gone, response not stored"),
        Err(e) => tracing::warn!(cache = cache_name, url = %request.url(), error = %e, "failed to store response"),
    }
}

/// Serve from the cache; on a miss fetch once and store the result.
pub(crate) async fn cache_first(
    db: &CacheDb, transport: &dyn Transport, cache_name: &str, request: &Request,
) -> Result<Response, Error> {
    match db.match_entry(cache_name, request).await {
        Ok(Some(cached)) => {
            tracing::debug!(cache = cache_name, url = %request.url(), "cache hit");
            return Ok(cached);
        }
        Ok(None) => tracing::debug!(cache = cache_name, url = %request.url(), "cache miss"),
        Err(e) => tracing::warn!(cache = cache_name, url = %request.url(), error = %e, "cache lookup failed"),
    }

    let response = transport.fetch(request).await?;
    store(db, cache_name, request, &response).await;
    Ok(response)
}

/// Fetch from the network and store; on network failure fall back to the
/// cached copy.
///
/// Only transport failures fall back. A request the transport rejects
/// outright (a malformed method, say) fails the same way online or offline.
pub(crate) async fn network_first(
    db: &CacheDb, transport: &dyn Transport, cache_name: &str, request: &Request,
) -> Result<Response, Error> {
    let network_err = match transport.fetch(request).await {
        Ok(response) => {
            store(db, cache_name, request, &response).await;
            return Ok(response);
        }
        Err(e) if e.is_network() => e,
        Err(e) => return Err(e),
    };

    tracing::debug!(url = %request.url(), error = %network_err, "network failed, trying cache");

    match db.match_entry(cache_name, request).await? {
        Some(cached) => {
            tracing::debug!(cache = cache_name, url = %request.url(), "served stale copy from cache");
            Ok(cached)
        }
        None => Err(Error::CacheMiss(format!("{} (network: {network_err})", request.url()))),
    }
}
