use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::join_all;
use reqwest::Url;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::{CacheError, FetchError, StorageError};
use super::fetcher::Fetcher;
use super::lifecycle::{ControlMessage, Lifecycle, WorkerState};
use super::request::{Request, RequestKey, Response};
use super::storage::CacheStorage;

/// Version tag of the current cache generation. Bump on deploy to evict
/// everything cached by earlier releases.
pub const CACHE_VERSION: &str = "govv-pwa-v1";

/// Application shell fetched at install time.
pub const PRECACHE_PATHS: &[&str] = &["/", "/index.html", "/manifest.json", "/offline.html", "/icon.svg"];

/// Served when a navigation fails and nothing is cached for it.
pub const OFFLINE_PAGE: &str = "/offline.html";

/// Upper bound on a navigation fetch before falling back to the cache.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct CacheManagerConfig {
    pub version_tag: String,
    /// Scope of the application; only requests on this origin are cached
    pub origin: Url,
    pub precache: Vec<String>,
    pub offline_page: String,
    pub navigation_timeout: Option<Duration>,
}

impl CacheManagerConfig {
    pub fn new(origin: Url) -> Self {
        Self {
            version_tag: CACHE_VERSION.to_string(),
            origin,
            precache: PRECACHE_PATHS.iter().map(|p| p.to_string()).collect(),
            offline_page: OFFLINE_PAGE.to_string(),
            navigation_timeout: Some(NAVIGATION_TIMEOUT),
        }
    }

    /// Absolute URL of a path on the application origin
    pub fn resolve(&self, path: &str) -> Option<Url> {
        self.origin.join(path).ok()
    }

    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivateReport {
    pub deleted: Vec<String>,
}

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Network,
    Cache,
    OfflineFallback,
}

#[derive(Debug)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
    /// Background refresh started for a response served from cache
    pub revalidation: Option<JoinHandle<()>>,
}

#[derive(Debug)]
pub enum FetchDisposition {
    /// Not intercepted; the caller performs the request itself
    PassThrough,
    Respond(Served),
}

/// The four lifecycle events the manager handles.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
    Message(serde_json::Value),
}

#[derive(Debug)]
pub enum EventOutcome {
    Installed(InstallReport),
    Activated(ActivateReport),
    Fetched(FetchDisposition),
    /// The decoded control message, or `None` if it was ignored
    Message(Option<ControlMessage>),
}

/// Offline cache manager.
///
/// Navigations are network-first with a cache and offline-page fallback.
/// Same-origin GETs are stale-while-revalidate. Everything else passes
/// through. Cache writes are best-effort and never fail a response.
pub struct CacheManager<F, S> {
    config: CacheManagerConfig,
    fetcher: Arc<F>,
    storage: Arc<S>,
    lifecycle: Mutex<Lifecycle>,
}

impl<F: Fetcher, S: CacheStorage> CacheManager<F, S> {
    pub fn new(config: CacheManagerConfig, fetcher: F, storage: S) -> Self {
        Self::with_shared(config, Arc::new(fetcher), Arc::new(storage))
    }

    pub fn with_shared(config: CacheManagerConfig, fetcher: Arc<F>, storage: Arc<S>) -> Self {
        Self {
            config,
            fetcher,
            storage,
            lifecycle: Mutex::new(Lifecycle::new()),
        }
    }

    pub fn config(&self) -> &CacheManagerConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lock_lifecycle()
    }

    fn lock_lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, allowed: &[WorkerState], to: WorkerState, event: &'static str) -> Result<(), CacheError> {
        let mut lifecycle = self.lock_lifecycle();
        if !allowed.contains(&lifecycle.state) {
            return Err(CacheError::InvalidState {
                state: lifecycle.state,
                event,
            });
        }
        lifecycle.state = to;
        Ok(())
    }

    fn set_state(&self, state: WorkerState) {
        self.lock_lifecycle().state = state;
    }

    /// Route an event to its handler.
    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome, CacheError> {
        match event {
            WorkerEvent::Install => Ok(EventOutcome::Installed(self.install().await?)),
            WorkerEvent::Activate => Ok(EventOutcome::Activated(self.activate()?)),
            WorkerEvent::Fetch(request) => Ok(EventOutcome::Fetched(self.handle_fetch(request).await?)),
            WorkerEvent::Message(payload) => Ok(EventOutcome::Message(self.handle_message(&payload))),
        }
    }

    /// Open the current generation and precache the application shell.
    ///
    /// Completes once every precache fetch has resolved. Resources that
    /// cannot be fetched are skipped and left to the fetch handler.
    pub async fn install(&self) -> Result<InstallReport, CacheError> {
        self.transition(
            &[WorkerState::Parsed, WorkerState::Redundant],
            WorkerState::Installing,
            "install",
        )?;

        let version = &self.config.version_tag;
        if let Err(e) = self.storage.open(version) {
            warn!(generation = %version, error = %e, "Failed to open cache, install aborted");
            self.set_state(WorkerState::Redundant);
            return Err(e.into());
        }

        let results = join_all(self.config.precache.iter().map(|path| self.precache(path))).await;

        let mut report = InstallReport::default();
        for (path, cached) in self.config.precache.iter().zip(results) {
            if cached {
                report.cached.push(path.clone());
            } else {
                report.skipped.push(path.clone());
            }
        }

        {
            let mut lifecycle = self.lock_lifecycle();
            lifecycle.state = WorkerState::Installed;
            lifecycle.skip_waiting = true;
        }

        info!(
            generation = %version,
            cached = report.cached.len(),
            skipped = report.skipped.len(),
            "Cache installed"
        );
        Ok(report)
    }

    async fn precache(&self, path: &str) -> bool {
        let Some(url) = self.config.resolve(path) else {
            warn!(path, "Invalid precache path");
            return false;
        };
        let request = Request::get(url);

        match self.fetcher.fetch(&request).await {
            Ok(response) if response.is_success() => {
                match self.storage.put(&self.config.version_tag, &request.key(), &response) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(path, error = %e, "Failed to store precached resource");
                        false
                    }
                }
            }
            Ok(response) => {
                debug!(path, status = response.status, "Precache skipped, bad status");
                false
            }
            Err(e) => {
                debug!(path, error = %e, "Precache skipped, fetch failed");
                false
            }
        }
    }

    /// Delete every generation except the current one and take control of
    /// open pages.
    pub fn activate(&self) -> Result<ActivateReport, CacheError> {
        self.transition(&[WorkerState::Installed], WorkerState::Activating, "activate")?;

        let deleted = match self.evict_stale_generations() {
            Ok(deleted) => deleted,
            Err(e) => {
                self.set_state(WorkerState::Installed);
                return Err(e.into());
            }
        };

        {
            let mut lifecycle = self.lock_lifecycle();
            lifecycle.clients_claimed = true;
            lifecycle.state = WorkerState::Activated;
        }

        info!(generation = %self.config.version_tag, deleted = deleted.len(), "Cache activated");
        Ok(ActivateReport { deleted })
    }

    fn evict_stale_generations(&self) -> Result<Vec<String>, StorageError> {
        let mut deleted = Vec::new();
        for generation in self.storage.keys()? {
            if generation != self.config.version_tag && self.storage.delete(&generation)? {
                debug!(generation = %generation, "Deleted stale cache generation");
                deleted.push(generation);
            }
        }
        Ok(deleted)
    }

    /// Handle a posted control message.
    pub fn handle_message(&self, payload: &serde_json::Value) -> Option<ControlMessage> {
        let message = ControlMessage::parse(payload);
        match message {
            Some(ControlMessage::SkipWaiting) => self.skip_waiting(),
            None => debug!(payload = %payload, "Ignoring unknown message"),
        }
        message
    }

    /// Become active as soon as installed, without waiting for open pages.
    pub fn skip_waiting(&self) {
        self.lock_lifecycle().skip_waiting = true;
        debug!("Skip waiting requested");
    }

    /// Decide how to answer an intercepted request.
    pub async fn handle_fetch(&self, request: Request) -> Result<FetchDisposition, FetchError> {
        if !request.is_get() {
            return Ok(FetchDisposition::PassThrough);
        }

        if request.is_navigation() {
            return Ok(FetchDisposition::Respond(self.handle_navigation(request).await?));
        }

        if self.config.is_same_origin(&request.url) {
            return Ok(FetchDisposition::Respond(self.handle_asset(request).await?));
        }

        Ok(FetchDisposition::PassThrough)
    }

    /// Network first; on failure the cached page, then the offline page.
    async fn handle_navigation(&self, request: Request) -> Result<Served, FetchError> {
        let key = request.key();

        match self.fetch_with_timeout(&request).await {
            Ok(response) => {
                self.store(&key, &response);
                return Ok(Served {
                    response,
                    source: ResponseSource::Network,
                    revalidation: None,
                });
            }
            Err(e) => warn!(url = %request.url, error = %e, "Navigation failed, falling back to cache"),
        }

        if let Some(response) = self.lookup_or_miss(&key) {
            return Ok(Served {
                response,
                source: ResponseSource::Cache,
                revalidation: None,
            });
        }

        let offline = self
            .config
            .resolve(&self.config.offline_page)
            .and_then(|url| self.lookup_or_miss(&Request::get(url).key()));

        match offline {
            Some(response) => Ok(Served {
                response,
                source: ResponseSource::OfflineFallback,
                revalidation: None,
            }),
            None => Err(FetchError::NoResponse(request.url.to_string())),
        }
    }

    /// Stale-while-revalidate: answer from cache and refresh in the
    /// background, or wait for the network on a miss.
    async fn handle_asset(&self, request: Request) -> Result<Served, FetchError> {
        let key = request.key();

        if let Some(response) = self.lookup_or_miss(&key) {
            let revalidation = self.spawn_revalidation(request, key);
            return Ok(Served {
                response,
                source: ResponseSource::Cache,
                revalidation: Some(revalidation),
            });
        }

        let response = self.fetcher.fetch(&request).await?;
        self.store(&key, &response);
        Ok(Served {
            response,
            source: ResponseSource::Network,
            revalidation: None,
        })
    }

    async fn fetch_with_timeout(&self, request: &Request) -> Result<Response, FetchError> {
        match self.config.navigation_timeout {
            Some(limit) => tokio::time::timeout(limit, self.fetcher.fetch(request))
                .await
                .map_err(|_| FetchError::Timeout(limit))?,
            None => self.fetcher.fetch(request).await,
        }
    }

    fn spawn_revalidation(&self, request: Request, key: RequestKey) -> JoinHandle<()> {
        let fetcher = Arc::clone(&self.fetcher);
        let storage = Arc::clone(&self.storage);
        let generation = self.config.version_tag.clone();

        tokio::spawn(async move {
            match fetcher.fetch(&request).await {
                Ok(response) => store_best_effort(storage.as_ref(), &generation, &key, &response),
                Err(e) => debug!(url = %request.url, error = %e, "Background refresh failed"),
            }
        })
    }

    fn store(&self, key: &RequestKey, response: &Response) {
        store_best_effort(self.storage.as_ref(), &self.config.version_tag, key, response);
    }

    /// Cached response for `key`, current generation first. Unreadable
    /// generations count as a miss.
    fn lookup_or_miss(&self, key: &RequestKey) -> Option<Response> {
        let current = &self.config.version_tag;
        if let Some(hit) = self.read(current, key) {
            return Some(hit);
        }

        let generations = match self.storage.keys() {
            Ok(generations) => generations,
            Err(e) => {
                warn!(error = %e, "Failed to list cache generations");
                return None;
            }
        };
        generations
            .iter()
            .filter(|generation| *generation != current)
            .find_map(|generation| self.read(generation, key))
    }

    fn read(&self, generation: &str, key: &RequestKey) -> Option<Response> {
        self.storage.get(generation, key).unwrap_or_else(|e| {
            warn!(generation, key = %key, error = %e, "Cache read failed");
            None
        })
    }
}

fn store_best_effort<S: CacheStorage>(storage: &S, generation: &str, key: &RequestKey, response: &Response) {
    match storage.put(generation, key, response) {
        Ok(()) => debug!(key = %key, "Cached response"),
        Err(e) => warn!(key = %key, error = %e, "Failed to cache response"),
    }
}
