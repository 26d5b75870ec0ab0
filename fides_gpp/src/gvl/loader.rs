use crate::gvl::{Gvl, GvlError};
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tracing::{debug, warn};
use url::Url;

/// Retrieves the body of a vendor list document.
#[async_trait]
pub trait GvlFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String, GvlError>;
}

/// Fetches vendor lists over HTTP.
#[cfg(feature = "http")]
#[derive(Clone, Debug)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
    timeout: std::time::Duration,
}

#[cfg(feature = "http")]
impl ReqwestFetcher {
    pub fn new(timeout: std::time::Duration) -> Self {
        Self::with_client(reqwest::Client::new(), timeout)
    }

    pub fn with_client(client: reqwest::Client, timeout: std::time::Duration) -> Self {
        Self { client, timeout }
    }
}

#[cfg(feature = "http")]
fn request_error(url: &Url, e: reqwest::Error) -> GvlError {
    if e.is_timeout() {
        GvlError::Timeout {
            url: url.to_string(),
        }
    } else {
        GvlError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl GvlFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, GvlError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GvlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| request_error(url, e))
    }
}

type SharedLoad = Shared<BoxFuture<'static, Result<Arc<Gvl>, GvlError>>>;

/// Vendor lists keyed by URL.
///
/// A load in progress is stored as well, so that concurrent callers await
/// the same request. Failed loads are removed once they complete.
#[derive(Clone, Default)]
pub struct GvlCache {
    entries: Arc<Mutex<HashMap<String, SharedLoad>>>,
}

impl GvlCache {
    /// The cache shared by the whole process.
    pub fn global() -> &'static GvlCache {
        static CACHE: OnceLock<GvlCache> = OnceLock::new();
        CACHE.get_or_init(GvlCache::default)
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, SharedLoad>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The vendor list loaded from `url`, if the load is complete.
    pub fn get(&self, url: &str) -> Option<Arc<Gvl>> {
        self.entries()
            .get(url)
            .and_then(|load| load.peek().cloned())
            .and_then(Result::ok)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    fn get_or_insert_with(
        &self,
        url: &str,
        load: impl FnOnce() -> BoxFuture<'static, Result<Arc<Gvl>, GvlError>>,
    ) -> SharedLoad {
        let mut entries = self.entries();
        if let Some(shared) = entries.get(url) {
            debug!(url, "vendor list cache hit");
            return shared.clone();
        }
        let shared = load().shared();
        entries.insert(url.to_string(), shared.clone());
        shared
    }

    fn evict_failed(&self, url: &str) {
        let mut entries = self.entries();
        let failed = entries
            .get(url)
            .and_then(|load| load.peek())
            .is_some_and(Result::is_err);
        if failed {
            entries.remove(url);
        }
    }
}

/// Loads vendor lists from `{base}/vendor-list.json` for the latest version
/// and `{base}/archives/vendor-list-v{N}.json` for version `N`.
#[derive(Clone)]
pub struct GvlLoader {
    base_url: Url,
    fetcher: Arc<dyn GvlFetcher>,
    cache: GvlCache,
}

impl GvlLoader {
    /// Creates a loader using the process wide cache.
    pub fn new(base_url: Url, fetcher: Arc<dyn GvlFetcher>) -> Self {
        Self {
            base_url,
            fetcher,
            cache: GvlCache::global().clone(),
        }
    }

    #[cfg(feature = "http")]
    pub fn from_config(
        config: &crate::config::GvlConfig,
    ) -> Result<Self, crate::config::ConfigError> {
        config.validate()?;
        let timeout = std::time::Duration::from_millis(config.timeout_ms);
        Ok(Self::new(
            config.url()?,
            Arc::new(ReqwestFetcher::new(timeout)),
        ))
    }

    pub fn with_cache(mut self, cache: GvlCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &GvlCache {
        &self.cache
    }

    pub fn url(&self, version: Option<u32>) -> Result<Url, GvlError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let url = match version {
            None => format!("{base}/vendor-list.json"),
            Some(v) => format!("{base}/archives/vendor-list-v{v}.json"),
        };
        Url::parse(&url).map_err(|e| GvlError::InvalidUrl(format!("{url}: {e}")))
    }

    /// Loads a vendor list, the latest one when `version` is `None`.
    ///
    /// A list already loaded from the same URL is returned without fetching
    /// it again.
    pub async fn load(&self, version: Option<u32>) -> Result<Arc<Gvl>, GvlError> {
        let url = self.url(version)?;
        let key = url.to_string();
        let load = self.cache.get_or_insert_with(&key, || {
            let fetcher = Arc::clone(&self.fetcher);
            async move {
                debug!(%url, "fetching vendor list");
                let body = fetcher.fetch(&url).await?;
                let gvl = Gvl::from_json(&body)?;
                match version {
                    Some(v) if gvl.version() != v => Err(GvlError::Invalid(format!(
                        "expected version {v}, found {}",
                        gvl.version()
                    ))),
                    _ => Ok(Arc::new(gvl)),
                }
            }
            .boxed()
        });

        let result = load.await;
        if let Err(e) = &result {
            warn!(url = %key, error = %e, retryable = e.is_retryable(), "unable to load vendor list");
            self.cache.evict_failed(&key);
        }
        result
    }

    pub async fn load_latest(&self) -> Result<Arc<Gvl>, GvlError> {
        self.load(None).await
    }
}
