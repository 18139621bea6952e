//! Offline cache manager for the web app.
//!
//! This module keeps the application shell and recently used assets in
//! versioned cache generations so the app keeps loading without a network.
//!
//! Request strategies:
//! - Page navigations: network first, then cache, then the offline page
//! - Same-origin GETs: stale-while-revalidate
//! - Everything else passes through untouched
//!
//! Bumping the version tag and reinstalling evicts every older generation
//! on activation.

pub mod error;
pub mod fetcher;
pub mod lifecycle;
pub mod manager;
pub mod request;
pub mod storage;

pub use error::{CacheError, FetchError, StorageError};
pub use fetcher::{Fetcher, HttpFetcher};
pub use lifecycle::{ControlMessage, Lifecycle, WorkerState};
pub use manager::{
    ActivateReport, CacheManager, CacheManagerConfig, EventOutcome, FetchDisposition, InstallReport,
    ResponseSource, Served, WorkerEvent, CACHE_VERSION, NAVIGATION_TIMEOUT, OFFLINE_PAGE, PRECACHE_PATHS,
};
pub use request::{Request, RequestKey, RequestMode, Response};
pub use storage::{CacheStorage, CachedData, DiskStorage, GenerationInfo, MemoryStorage};
