//! Immutable configuration handed to a service worker at construction.

use mentepyme_core::{AppConfig, Error, Request};
use url::Url;

use crate::fetch::resolve;

/// One cache generation's identity: its cache name, the origin it serves,
/// and the static asset manifest it pre-caches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    cache_name: String,
    origin: Url,
    static_assets: Vec<String>,
}

impl WorkerConfig {
    pub fn new(cache_name: impl Into<String>, origin: Url, static_assets: Vec<String>) -> Self {
        Self { cache_name: cache_name.into(), origin, static_assets }
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Manifest paths in declaration order.
    pub fn static_assets(&self) -> &[String] {
        &self.static_assets
    }

    pub fn is_static_asset(&self, path: &str) -> bool {
        self.static_assets.iter().any(|p| p == path)
    }

    /// Scheme, host and port all match the configured origin.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    /// GET request for a manifest path, resolved against the origin.
    pub fn asset_request(&self, path: &str) -> Result<Request, Error> {
        let url = resolve(&self.origin, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;
        Ok(Request::get(url))
    }
}

impl TryFrom<&AppConfig> for WorkerConfig {
    type Error = Error;

    fn try_from(config: &AppConfig) -> Result<Self, Self::Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.origin)))?;
        Ok(Self::new(config.cache_name(), origin, config.static_assets.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WorkerConfig {
        WorkerConfig::try_from(&AppConfig::default()).unwrap()
    }

    #[test]
    fn test_from_app_config() {
        let config = config();
        assert_eq!(config.cache_name(), "mentepy-cache-v1");
        assert_eq!(config.origin().as_str(), "http://localhost:8000/");
        assert_eq!(config.static_assets().len(), 7);
    }

    #[test]
    fn test_is_static_asset_exact_match() {
        let config = config();
        assert!(config.is_static_asset("/style.css"));
        assert!(config.is_static_asset("/"));
        assert!(!config.is_static_asset("/style.css/"));
        assert!(!config.is_static_asset("/api/ventas"));
    }

    #[test]
    fn test_same_origin_compares_scheme_host_port() {
        let config = config();
        assert!(config.is_same_origin(&Url::parse("http://localhost:8000/app.js").unwrap()));
        assert!(!config.is_same_origin(&Url::parse("https://localhost:8000/app.js").unwrap()));
        assert!(!config.is_same_origin(&Url::parse("http://localhost:9000/app.js").unwrap()));
        assert!(!config.is_same_origin(&Url::parse("http://cdn.example/app.js").unwrap()));
    }

    #[test]
    fn test_asset_request() {
        let request = config().asset_request("/icons/icon-512.png").unwrap();
        assert_eq!(request.method(), "GET");
        assert_eq!(request.url().as_str(), "http://localhost:8000/icons/icon-512.png");
    }

    #[test]
    fn test_invalid_origin() {
        let app = AppConfig { origin: "not a url".into(), ..Default::default() };
        assert!(matches!(WorkerConfig::try_from(&app), Err(Error::InvalidUrl(_))));
    }
}
